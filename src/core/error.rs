//! Error types for ESPOS
//!
//! Uses Rust's Result pattern. Each variant carries the negative errno value
//! C callers of the layer expect, so `code()` is a plain cast.

use core::fmt;

/// Abstraction layer error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum EsposError {
    /// Missing or empty parameter, zero size, stale handle or unknown option
    InvalidArgument = -22,
    /// Kernel object or bookkeeping allocation failed
    OutOfMemory = -12,
    /// The wait elapsed before the condition occurred
    Timeout = -116,
    /// Task-context-only operation called from an interrupt handler
    CalledFromIsr = -4,
    /// Caller does not hold the mutex
    PermissionDenied = -1,
    /// Semaphore already at its maximum count
    ResourceBusy = -11,
    /// The kernel refused the request
    Canceled = -140,
    /// Operation not provided by this kernel
    NotSupported = -134,
}

/// Result type alias for ESPOS operations
pub type EsposResult<T> = Result<T, EsposError>;

impl EsposError {
    /// Negative errno value of this error
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Map a status code back to an error; `0` and unknown codes give `None`
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -22 => Some(EsposError::InvalidArgument),
            -12 => Some(EsposError::OutOfMemory),
            -116 => Some(EsposError::Timeout),
            -4 => Some(EsposError::CalledFromIsr),
            -1 => Some(EsposError::PermissionDenied),
            -11 => Some(EsposError::ResourceBusy),
            -140 => Some(EsposError::Canceled),
            -134 => Some(EsposError::NotSupported),
            _ => None,
        }
    }
}

impl fmt::Display for EsposError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EsposError::InvalidArgument => "invalid argument",
            EsposError::OutOfMemory => "out of memory",
            EsposError::Timeout => "timed out",
            EsposError::CalledFromIsr => "not allowed in interrupt context",
            EsposError::PermissionDenied => "caller does not hold the mutex",
            EsposError::ResourceBusy => "resource busy",
            EsposError::Canceled => "canceled by the kernel",
            EsposError::NotSupported => "not supported",
        };
        f.write_str(msg)
    }
}

/// Status code of a result: `0` on success, the negative errno otherwise
#[inline]
pub fn status_code<T>(result: &EsposResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}
