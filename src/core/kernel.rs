//! Abstraction layer instance and scheduler control
//!
//! [`Espos`] owns the kernel, the per-core bookkeeping shared by the context
//! classifier and the critical section manager, and one handle registry per
//! object kind. Every public operation of the layer is a method on it.

use alloc::sync::Arc;

use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::CFG_PROCESSORS_NUM;
use crate::core::registry::Registry;
use crate::mutex::MutexRecord;
use crate::port::Kernel;
use crate::queue::QueueRecord;
use crate::sem::SemRecord;
use crate::task::TaskRecord;
use crate::timer::TimerRecord;
use crate::types::{NestingCtr, SchedState};

// ============ Per-core State ============

/// Bookkeeping one core keeps for itself
///
/// Only the owning core writes these counters, and only with its interrupts
/// masked or from its own interrupt trampoline.
pub struct CoreState {
    critical_nesting: AtomicUsize,
    critical_saved: AtomicBool,
    isr_nesting: AtomicUsize,
    os_nesting: AtomicUsize,
}

impl CoreState {
    const fn new() -> Self {
        Self {
            critical_nesting: AtomicUsize::new(0),
            critical_saved: AtomicBool::new(false),
            isr_nesting: AtomicUsize::new(0),
            os_nesting: AtomicUsize::new(0),
        }
    }

    /// Critical section nesting level
    #[inline(always)]
    pub fn critical_nesting(&self) -> NestingCtr {
        self.critical_nesting.load(Ordering::Acquire)
    }

    /// Interrupt nesting level
    #[inline(always)]
    pub fn isr_nesting(&self) -> NestingCtr {
        self.isr_nesting.load(Ordering::Acquire)
    }

    /// OS-internal call nesting level
    #[inline(always)]
    pub fn os_nesting(&self) -> NestingCtr {
        self.os_nesting.load(Ordering::Acquire)
    }

    /// Increment critical nesting, returning the previous level
    #[inline(always)]
    pub(crate) fn critical_inc(&self) -> NestingCtr {
        self.critical_nesting.fetch_add(1, Ordering::AcqRel)
    }

    /// Decrement critical nesting, returning the new level
    #[inline(always)]
    pub(crate) fn critical_dec(&self) -> NestingCtr {
        Self::saturating_dec(&self.critical_nesting)
    }

    #[inline(always)]
    pub(crate) fn save_irq_enabled(&self, enabled: bool) {
        self.critical_saved.store(enabled, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn saved_irq_enabled(&self) -> bool {
        self.critical_saved.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn isr_inc(&self) {
        self.isr_nesting.fetch_add(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub(crate) fn isr_dec(&self) -> NestingCtr {
        Self::saturating_dec(&self.isr_nesting)
    }

    #[inline(always)]
    pub(crate) fn os_inc(&self) {
        self.os_nesting.fetch_add(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub(crate) fn os_dec(&self) -> NestingCtr {
        Self::saturating_dec(&self.os_nesting)
    }

    /// Decrement unless already zero, returning the new value
    fn saturating_dec(ctr: &AtomicUsize) -> NestingCtr {
        match ctr.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }
}

// ============ Layer Instance ============

/// The OS abstraction layer over kernel `K`
pub struct Espos<K: Kernel> {
    pub(crate) kernel: Arc<K>,
    pub(crate) cores: [CoreState; CFG_PROCESSORS_NUM],
    pub(crate) tasks: Arc<Registry<TaskRecord<K>>>,
    pub(crate) mutexes: Registry<MutexRecord<K>>,
    pub(crate) sems: Registry<SemRecord<K>>,
    pub(crate) queues: Registry<QueueRecord<K>>,
    pub(crate) timers: Registry<TimerRecord<K>>,
}

impl<K: Kernel> Espos<K> {
    /// Initialize the layer on top of `kernel`
    pub fn new(kernel: K) -> Self {
        const IDLE_CORE: CoreState = CoreState::new();

        crate::debug!("espos: init, {} core(s)", CFG_PROCESSORS_NUM);
        Self {
            kernel: Arc::new(kernel),
            cores: [IDLE_CORE; CFG_PROCESSORS_NUM],
            tasks: Arc::new(Registry::new()),
            mutexes: Registry::new(),
            sems: Registry::new(),
            queues: Registry::new(),
            timers: Registry::new(),
        }
    }

    /// The underlying kernel
    #[inline(always)]
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Bookkeeping of core `core_id`
    ///
    /// # Panics
    /// If `core_id >= CFG_PROCESSORS_NUM`.
    #[inline(always)]
    pub fn core(&self, core_id: usize) -> &CoreState {
        &self.cores[core_id]
    }

    /// Start multitasking
    pub fn start(&self) {
        crate::info!("espos: starting scheduler");
        self.kernel.start();
    }

    /// Current scheduler state
    #[inline]
    pub fn sched_state(&self) -> SchedState {
        self.kernel.sched_state()
    }

    /// Stop the current task from being preempted
    pub fn preempt_suspend_local(&self) {
        self.kernel.suspend_all();
    }

    /// Allow preemption again, yielding if a switch is still pending
    pub fn preempt_resume_local(&self) {
        if !self.kernel.resume_all() {
            self.kernel.task_yield();
        }
    }
}
