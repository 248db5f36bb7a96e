//! Core type definitions for ESPOS
//!
//! These types provide strong typing for the abstraction layer's API.

use bitflags::bitflags;

use crate::error::{EsposError, EsposResult};

/// Task priority (0 = lowest, kernel convention)
pub type Prio = u8;

/// Tick counter type
pub type Tick = u32;

/// Semaphore counter type
pub type SemCount = u32;

/// Nesting counter
pub type NestingCtr = usize;

/// Raw value no handle ever takes
pub const OBJ_NONE: usize = 0;

/// Saved local interrupt state
///
/// Holds whether interrupts were enabled before they were masked. Only the
/// state captured at the outermost critical section is ever restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqState(bool);

impl IrqState {
    /// State of a CPU whose interrupts were enabled
    pub const ENABLED: IrqState = IrqState(true);
    /// State of a CPU whose interrupts were already masked
    pub const MASKED: IrqState = IrqState(false);

    #[inline(always)]
    pub const fn from_enabled(enabled: bool) -> Self {
        IrqState(enabled)
    }

    #[inline(always)]
    pub const fn was_enabled(self) -> bool {
        self.0
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SchedState {
    /// `start` has not been called yet
    NotStarted = 0,
    /// Tasks are being scheduled
    Running = 1,
    /// Scheduling is suspended
    Suspended = 2,
}

/// Mutex flavour, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum MutexType {
    Normal = 0,
    Recursive = 1,
}

impl MutexType {
    pub fn from_raw(raw: u32) -> EsposResult<Self> {
        match raw {
            0 => Ok(MutexType::Normal),
            1 => Ok(MutexType::Recursive),
            _ => Err(EsposError::InvalidArgument),
        }
    }
}

/// Queue insertion point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum QueuePos {
    /// Urgent message, received next
    Front = 0,
    /// FIFO order
    Back = 1,
}

impl QueuePos {
    pub fn from_raw(raw: u32) -> EsposResult<Self> {
        match raw {
            0 => Ok(QueuePos::Front),
            1 => Ok(QueuePos::Back),
            _ => Err(EsposError::InvalidArgument),
        }
    }
}

/// Queue send behaviour when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum SendMode {
    /// Wait for space, up to the given ticks
    Normal = 0,
    /// Never wait; drop the message at the opposite end to make room
    Overwrite = 1,
}

impl SendMode {
    pub fn from_raw(raw: u32) -> EsposResult<Self> {
        match raw {
            0 => Ok(SendMode::Normal),
            1 => Ok(SendMode::Overwrite),
            _ => Err(EsposError::InvalidArgument),
        }
    }
}

/// Queue receive behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum RecvMode {
    /// Remove the message
    Normal = 0,
    /// Copy the next message, leave it queued
    Peek = 1,
}

impl RecvMode {
    pub fn from_raw(raw: u32) -> EsposResult<Self> {
        match raw {
            0 => Ok(RecvMode::Normal),
            1 => Ok(RecvMode::Peek),
            _ => Err(EsposError::InvalidArgument),
        }
    }
}

bitflags! {
    /// Timer creation options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerOpt: u32 {
        /// Re-arm after every expiry instead of firing once
        const AUTO_RELOAD = 0x0001;
        /// Start counting as soon as the timer is created
        const AUTO_START = 0x0002;
        /// Periodic timer that is already running
        const AUTO_RUN = Self::AUTO_RELOAD.bits() | Self::AUTO_START.bits();
    }
}

impl TimerOpt {
    /// One-shot timer that waits for `timer_start`
    pub const NO_AUTO_RUN: TimerOpt = TimerOpt::empty();

    pub fn from_raw(raw: u32) -> EsposResult<Self> {
        TimerOpt::from_bits(raw).ok_or(EsposError::InvalidArgument)
    }
}

/// Timer reconfiguration selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TimerChange {
    /// Set a new period; the value is in ticks
    Period = 0,
    /// Switch to one-shot mode
    OneShot = 1,
    /// Switch to auto-reload mode
    AutoReload = 2,
}

impl TimerChange {
    pub fn from_raw(raw: u32) -> EsposResult<Self> {
        match raw {
            0 => Ok(TimerChange::Period),
            1 => Ok(TimerChange::OneShot),
            2 => Ok(TimerChange::AutoReload),
            _ => Err(EsposError::InvalidArgument),
        }
    }
}
