//! ESPOS - portable RTOS abstraction layer in Rust
//!
//! One API for application and driver code on top of a preemptive kernel:
//! - Tasks, mutexes, counting semaphores, message queues and software timers
//! - Interrupt-aware dispatch: blocking paths in tasks, non-blocking paths
//!   in interrupt handlers
//! - Reentrant per-core critical sections, spinlocked on multi-core builds
//!
//! The kernel is any [`port::Kernel`]. With the `std` feature the crate
//! ships [`HostKernel`], which runs the layer on host threads.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

// ============ Modules ============

pub mod log;

pub mod core;
pub mod port;
pub mod sync;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::context;
pub use crate::core::context::OsInternal;
pub use crate::core::critical;
pub use crate::core::critical::{CriticalSection, SpinLock};
pub use crate::core::error;
pub use crate::core::error::{status_code, EsposError, EsposResult};
pub use crate::core::kernel;
pub use crate::core::kernel::Espos;
pub use crate::core::task;
pub use crate::core::task::TaskHandle;
pub use crate::core::time;
pub use crate::core::timer;
pub use crate::core::timer::TimerHandle;
pub use crate::core::types;
pub use crate::core::types::*;

pub use crate::sync::mutex;
pub use crate::sync::mutex::MutexHandle;
pub use crate::sync::queue;
pub use crate::sync::queue::QueueHandle;
pub use crate::sync::sem;
pub use crate::sync::sem::SemHandle;

#[cfg(feature = "std")]
pub use crate::port::host::HostKernel;
