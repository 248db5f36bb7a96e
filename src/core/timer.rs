//! Software timer module
//!
//! Timers run their callback on the kernel's timer service task. The kernel
//! only knows a boxed closure that owns the user callback together with its
//! argument and calls it with the layer's own handle; the closure is dropped
//! with the kernel timer when the timer is deleted.

use alloc::boxed::Box;
use alloc::string::String;

use crate::config::CFG_MAX_DELAY;
use crate::core::kernel::Espos;
use crate::core::registry::handle_type;
use crate::error::{EsposError, EsposResult};
use crate::port::{Kernel, KernelTimerCallback};
use crate::types::{Tick, TimerChange, TimerOpt};

handle_type!(
    /// Software timer handle
    TimerHandle
);

pub(crate) struct TimerRecord<K: Kernel> {
    raw: K::Timer,
    name: String,
}

impl<K: Kernel> Clone for TimerRecord<K> {
    fn clone(&self) -> Self {
        TimerRecord {
            raw: self.raw.clone(),
            name: self.name.clone(),
        }
    }
}

impl<K: Kernel> Espos<K> {
    /// Create a software timer
    ///
    /// # Arguments
    /// * `name` - Timer name
    /// * `callback` - Called on expiry with the timer's handle and `arg`
    /// * `arg` - Argument owned by the timer until it is deleted
    /// * `period` - Expiry period in ticks, non-zero
    /// * `opt` - Reload and start options
    ///
    /// # Returns
    /// * `Err(EsposError::Canceled)` - [`TimerOpt::AUTO_START`] was given and
    ///   the kernel refused to start the timer; nothing was created
    pub fn timer_create<A, F>(
        &self,
        name: &str,
        mut callback: F,
        arg: A,
        period: Tick,
        opt: TimerOpt,
    ) -> EsposResult<TimerHandle>
    where
        A: Send + 'static,
        F: FnMut(TimerHandle, &A) + Send + 'static,
    {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        if name.is_empty() || period == 0 {
            return Err(EsposError::InvalidArgument);
        }

        let handle = self.timers.reserve()?;
        let timer = TimerHandle(handle);
        let shim: KernelTimerCallback = Box::new(move || callback(timer, &arg));

        let auto_reload = opt.contains(TimerOpt::AUTO_RELOAD);
        let Some(raw) = self.kernel.timer_create(name, period, auto_reload, shim) else {
            self.timers.remove(handle);
            return Err(EsposError::OutOfMemory);
        };

        let record = TimerRecord {
            raw: raw.clone(),
            name: String::from(name),
        };
        if self.timers.fill(handle, record).is_err() {
            self.kernel.timer_delete(&raw, CFG_MAX_DELAY);
            return Err(EsposError::InvalidArgument);
        }

        if opt.contains(TimerOpt::AUTO_START) && !self.kernel.timer_start(&raw, CFG_MAX_DELAY) {
            self.timers.remove(handle);
            self.kernel.timer_delete(&raw, CFG_MAX_DELAY);
            return Err(EsposError::Canceled);
        }

        crate::debug!("espos: timer {} created, period {}", handle.get(), period);
        Ok(timer)
    }

    /// Start a timer, or restart it if already running
    pub fn timer_start(&self, timer: TimerHandle) -> EsposResult<()> {
        let raw = self.timer_raw(timer)?;

        self.dispatch(
            |woken| accepted(self.kernel.timer_start_from_isr(&raw, woken)),
            || accepted(self.kernel.timer_start(&raw, CFG_MAX_DELAY)),
        )
    }

    /// Stop a timer; its callback will not run until it is started again
    pub fn timer_stop(&self, timer: TimerHandle) -> EsposResult<()> {
        let raw = self.timer_raw(timer)?;

        self.dispatch(
            |woken| accepted(self.kernel.timer_stop_from_isr(&raw, woken)),
            || accepted(self.kernel.timer_stop(&raw, CFG_MAX_DELAY)),
        )
    }

    /// Reconfigure a timer
    ///
    /// Only [`TimerChange::Period`] is supported; `value` is then the new
    /// non-zero period in ticks and the timer is (re)started with it.
    pub fn timer_change(
        &self,
        timer: TimerHandle,
        change: TimerChange,
        value: Tick,
    ) -> EsposResult<()> {
        let raw = self.timer_raw(timer)?;

        match change {
            TimerChange::Period if value != 0 => self.dispatch(
                |woken| accepted(self.kernel.timer_change_period_from_isr(&raw, value, woken)),
                || accepted(self.kernel.timer_change_period(&raw, value, CFG_MAX_DELAY)),
            ),
            _ => Err(EsposError::InvalidArgument),
        }
    }

    /// Whether a timer is counting down
    pub fn timer_is_active(&self, timer: TimerHandle) -> EsposResult<bool> {
        let raw = self.timer_raw(timer)?;
        Ok(self.kernel.timer_is_active(&raw))
    }

    /// Name of a timer
    pub fn timer_get_name(&self, timer: TimerHandle) -> EsposResult<String> {
        self.timer_record(timer).map(|record| record.name)
    }

    /// Delete a timer and drop its callback and argument
    ///
    /// If the kernel refuses, the timer stays valid and `Canceled` is returned.
    pub fn timer_del(&self, timer: TimerHandle) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let raw = self.timer_raw(timer)?;
        if !self.kernel.timer_delete(&raw, CFG_MAX_DELAY) {
            return Err(EsposError::Canceled);
        }

        self.timers.remove(timer.0);
        crate::debug!("espos: timer {} deleted", timer.as_raw());
        Ok(())
    }

    fn timer_record(&self, timer: TimerHandle) -> EsposResult<TimerRecord<K>> {
        self.timers.get(timer.0).ok_or(EsposError::InvalidArgument)
    }

    fn timer_raw(&self, timer: TimerHandle) -> EsposResult<K::Timer> {
        self.timers
            .with(timer.0, |record| record.raw.clone())
            .ok_or(EsposError::InvalidArgument)
    }
}

#[inline]
fn accepted(ok: bool) -> EsposResult<()> {
    if ok {
        Ok(())
    } else {
        Err(EsposError::Canceled)
    }
}
