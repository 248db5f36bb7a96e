//! Core abstraction layer modules
//!
//! Contains the layer instance, context classification, critical sections,
//! tasks, timers and time management.

pub mod config;
pub mod context;
pub mod critical;
pub mod error;
pub mod kernel;
pub(crate) mod registry;
pub mod task;
pub mod time;
pub mod timer;
pub mod types;
