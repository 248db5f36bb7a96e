//! Context classification and ISR-aware dispatch
//!
//! Every primitive either refuses to run in interrupt context or picks a
//! non-blocking interrupt variant. [`Espos::dispatch`] is the single place
//! that makes that choice.

use core::marker::PhantomData;

use crate::core::kernel::Espos;
use crate::error::EsposResult;
use crate::port::Kernel;
use crate::types::NestingCtr;

impl<K: Kernel> Espos<K> {
    /// Check if the CPU is executing an interrupt handler
    ///
    /// Read from the CPU port, never from the software nesting counters:
    /// those lag behind the hardware on interrupt entry.
    #[inline]
    pub fn in_isr(&self) -> bool {
        self.kernel.in_isr()
    }

    /// Check if the caller runs inside an OS-internal section on this core
    #[inline]
    pub fn in_os_internal(&self) -> bool {
        self.core(self.kernel.core_id()).os_nesting() > 0
    }

    /// Mark entry into an OS-internal section
    pub fn os_enter(&self) {
        self.core(self.kernel.core_id()).os_inc();
    }

    /// Mark exit from an OS-internal section; unbalanced calls are ignored
    pub fn os_exit(&self) {
        self.core(self.kernel.core_id()).os_dec();
    }

    /// Scoped OS-internal section
    pub fn os_internal(&self) -> OsInternal<'_, K> {
        let core_id = self.kernel.core_id();
        self.core(core_id).os_inc();
        OsInternal {
            os: self,
            core_id,
            _not_send: PhantomData,
        }
    }

    /// Record interrupt entry; call from the interrupt trampoline
    pub fn isr_enter(&self) {
        self.core(self.kernel.core_id()).isr_inc();
    }

    /// Record interrupt exit; unbalanced calls are ignored
    pub fn isr_exit(&self) {
        self.core(self.kernel.core_id()).isr_dec();
    }

    /// Interrupt nesting recorded for core `core_id`
    #[inline]
    pub fn isr_nesting(&self, core_id: usize) -> NestingCtr {
        self.core(core_id).isr_nesting()
    }

    /// Run `from_isr` in interrupt context, `from_task` otherwise
    ///
    /// `from_isr` must not block. It receives the kernel's "higher priority
    /// task woken" flag; when it succeeds with the flag set, a context switch
    /// is requested before returning so the woken task runs as soon as the
    /// interrupt exits.
    pub(crate) fn dispatch<T>(
        &self,
        from_isr: impl FnOnce(&mut bool) -> EsposResult<T>,
        from_task: impl FnOnce() -> EsposResult<T>,
    ) -> EsposResult<T> {
        if !self.in_isr() {
            return from_task();
        }

        let mut woken = false;
        let ret = from_isr(&mut woken);
        if ret.is_ok() && woken {
            self.kernel.yield_from_isr();
        }
        ret
    }
}

/// Guard for an OS-internal section; leaves it when dropped
pub struct OsInternal<'a, K: Kernel> {
    os: &'a Espos<K>,
    core_id: usize,
    _not_send: PhantomData<*const ()>,
}

impl<K: Kernel> Drop for OsInternal<'_, K> {
    fn drop(&mut self) {
        self.os.core(self.core_id).os_dec();
    }
}
