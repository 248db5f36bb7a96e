//! Compile-time configuration for ESPOS
//!
//! These constants control resource limits and the tick granularity shared
//! by the abstraction layer and the bundled kernel ports.

use crate::types::Tick;

/// Number of CPU cores with their own critical-section bookkeeping
#[cfg(feature = "smp")]
pub const CFG_PROCESSORS_NUM: usize = 2;

/// Number of CPU cores with their own critical-section bookkeeping
#[cfg(not(feature = "smp"))]
pub const CFG_PROCESSORS_NUM: usize = 1;

/// Highest task priority level the kernel accepts, plus one
pub const CFG_MAX_PRIORITIES: usize = 15;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 100;

/// Wait forever
pub const CFG_MAX_DELAY: Tick = Tick::MAX;

/// Poll, never block
pub const CFG_NO_DELAY: Tick = 0;

/// Task name buffer length, including the terminator slot
pub const CFG_TASK_NAME_LEN: usize = 16;

/// Smallest stack handed to a host thread, in bytes
pub const CFG_HOST_STACK_MIN: usize = 64 * 1024;

/// Name of the kernel task that runs timer callbacks
pub const CFG_TIMER_SERVICE_NAME: &str = "Tmr Svc";
