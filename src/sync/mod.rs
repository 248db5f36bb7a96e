//! Synchronization primitives
//!
//! Contains mutexes, counting semaphores and message queues.

pub mod mutex;
pub mod queue;
pub mod sem;
