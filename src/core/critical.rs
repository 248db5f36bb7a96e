//! Critical section handling for ESPOS
//!
//! Interrupt masking is reentrant per core: only the outermost entry saves the
//! previous interrupt state and only the matching outermost exit restores it.
//! With the `smp` feature a [`SpinLock`] additionally keeps the other cores
//! out; a core that already holds the lock re-enters without spinning.

use core::marker::PhantomData;

use portable_atomic::{AtomicUsize, Ordering};

use crate::core::kernel::Espos;
use crate::port::Kernel;
use crate::types::{IrqState, NestingCtr};

/// Cross-core lock taken by critical sections on multi-core builds
pub struct SpinLock {
    /// Holding core plus one, zero when free
    holder: AtomicUsize,
    /// Recursive holds by the holding core
    #[cfg(feature = "smp")]
    depth: AtomicUsize,
}

impl SpinLock {
    pub const fn new() -> Self {
        SpinLock {
            holder: AtomicUsize::new(0),
            #[cfg(feature = "smp")]
            depth: AtomicUsize::new(0),
        }
    }

    /// Core currently holding the lock
    #[inline]
    pub fn holder(&self) -> Option<usize> {
        match self.holder.load(Ordering::Acquire) {
            0 => None,
            n => Some(n - 1),
        }
    }

    #[cfg(feature = "smp")]
    fn lock(&self, core_id: usize) {
        let me = core_id + 1;
        if self.holder.load(Ordering::Acquire) == me {
            self.depth.fetch_add(1, Ordering::Relaxed);
            return;
        }

        while self
            .holder
            .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        self.depth.store(1, Ordering::Relaxed);
    }

    #[cfg(feature = "smp")]
    fn unlock(&self, core_id: usize) {
        if self.holder.load(Ordering::Acquire) != core_id + 1 {
            return;
        }
        if self.depth.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.holder.store(0, Ordering::Release);
        }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for critical sections
///
/// Created by [`Espos::enter_critical`]. When dropped, the nesting level of
/// the core it was entered on drops by one and interrupts are restored once
/// it reaches zero. The guard cannot leave the core it was created on.
pub struct CriticalSection<'a, K: Kernel> {
    os: &'a Espos<K>,
    lock: &'a SpinLock,
    core_id: usize,
    state: IrqState,
    _not_send: PhantomData<*const ()>,
}

impl<K: Kernel> CriticalSection<'_, K> {
    /// Interrupt state saved on entry
    ///
    /// Only meaningful for the outermost section of a core.
    #[inline]
    pub fn token(&self) -> IrqState {
        self.state
    }

    /// Core this section masks
    #[inline]
    pub fn core_id(&self) -> usize {
        self.core_id
    }

    /// Leave the critical section now
    #[inline]
    pub fn exit(self) {}
}

impl<K: Kernel> Drop for CriticalSection<'_, K> {
    fn drop(&mut self) {
        self.os.exit_critical_on(self.core_id, self.lock);
    }
}

impl<K: Kernel> Espos<K> {
    /// Enter a critical section by masking local interrupts
    ///
    /// Returns a guard that will restore interrupt state when dropped.
    pub fn enter_critical<'a>(&'a self, lock: &'a SpinLock) -> CriticalSection<'a, K> {
        // masked from here on, so the task can no longer migrate
        let state = self.kernel.irq_save();
        let core_id = self.kernel.core_id();
        self.enter_critical_on(core_id, lock, state);

        CriticalSection {
            os: self,
            lock,
            core_id,
            state,
            _not_send: PhantomData,
        }
    }

    /// Execute a closure inside a critical section
    #[inline]
    pub fn critical_section<F, R>(&self, lock: &SpinLock, f: F) -> R
    where
        F: FnOnce(&CriticalSection<'_, K>) -> R,
    {
        let cs = self.enter_critical(lock);
        f(&cs)
    }

    /// Critical section nesting level of core `core_id`
    #[inline]
    pub fn critical_nesting(&self, core_id: usize) -> NestingCtr {
        self.core(core_id).critical_nesting()
    }

    fn enter_critical_on(&self, core_id: usize, _lock: &SpinLock, state: IrqState) {
        let core = self.core(core_id);
        if core.critical_nesting() == 0 {
            core.save_irq_enabled(state.was_enabled());
        }
        core.critical_inc();

        #[cfg(feature = "smp")]
        _lock.lock(core_id);
    }

    fn exit_critical_on(&self, core_id: usize, _lock: &SpinLock) {
        #[cfg(feature = "smp")]
        _lock.unlock(core_id);

        let core = self.core(core_id);
        if core.critical_dec() == 0 {
            self.kernel
                .irq_restore(IrqState::from_enabled(core.saved_irq_enabled()));
        }
    }
}
