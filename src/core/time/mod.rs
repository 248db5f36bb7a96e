//! Time management module
//!
//! Provides tick conversion and millisecond or clock-style delays on top of
//! the kernel's tick-based delay.

use crate::config::CFG_TICK_RATE_HZ;
use crate::core::kernel::Espos;
use crate::error::{EsposError, EsposResult};
use crate::port::Kernel;
use crate::types::Tick;

/// Convert milliseconds to ticks, rounding up
///
/// A non-zero duration never becomes a zero-tick poll. Saturates at
/// `Tick::MAX`, which the kernel reads as "wait forever".
pub const fn ms_to_ticks(ms: u32) -> Tick {
    let ticks = (ms as u64 * CFG_TICK_RATE_HZ as u64).div_ceil(1000);
    if ticks > Tick::MAX as u64 {
        Tick::MAX
    } else {
        ticks as Tick
    }
}

/// Convert ticks to milliseconds, saturating at `u32::MAX`
pub const fn ticks_to_ms(ticks: Tick) -> u32 {
    let ms = ticks as u64 * 1000 / CFG_TICK_RATE_HZ as u64;
    if ms > u32::MAX as u64 {
        u32::MAX
    } else {
        ms as u32
    }
}

impl<K: Kernel> Espos<K> {
    /// Ticks elapsed since the kernel started counting
    #[inline]
    pub fn get_tick_count(&self) -> Tick {
        self.kernel.tick_count()
    }

    /// Block the calling task for at least `ms` milliseconds
    ///
    /// # Returns
    /// * `Err(EsposError::CalledFromIsr)` - Cannot delay from ISR
    pub fn delay_ms(&self, ms: u32) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        self.kernel.task_delay(ms_to_ticks(ms));
        Ok(())
    }

    /// Time delay in hours, minutes, seconds, milliseconds
    ///
    /// # Arguments
    /// * `hours` - Hours (0-999)
    /// * `minutes` - Minutes (0-59)
    /// * `seconds` - Seconds (0-59)
    /// * `milliseconds` - Milliseconds (0-999)
    pub fn delay_hmsm(
        &self,
        hours: u16,
        minutes: u8,
        seconds: u8,
        milliseconds: u16,
    ) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        if hours > 999 || minutes > 59 || seconds > 59 || milliseconds > 999 {
            return Err(EsposError::InvalidArgument);
        }

        let total_ms = (hours as u64) * 3_600_000
            + (minutes as u64) * 60_000
            + (seconds as u64) * 1000
            + (milliseconds as u64);

        let ticks = (total_ms * CFG_TICK_RATE_HZ as u64).div_ceil(1000);
        self.kernel.task_delay(Tick::try_from(ticks).unwrap_or(Tick::MAX));
        Ok(())
    }
}
