//! Port layer - the kernel the abstraction layer runs on
//!
//! [`Kernel`] lists every primitive the layer consumes from the underlying
//! RTOS. Kernel objects are exposed as cheap, cloneable tokens; the layer
//! never looks inside them and never hands them to its own callers.
//!
//! Calls that take a `wait` argument block for at most that many ticks,
//! `0` polls and [`CFG_MAX_DELAY`](crate::config::CFG_MAX_DELAY) waits
//! forever. `*_from_isr` calls never block and set `woken` when they made a
//! task ready that outranks the interrupted one.

use alloc::boxed::Box;
use alloc::string::String;

use crate::types::{IrqState, Prio, QueuePos, RecvMode, SchedState, SemCount, SendMode, Tick};

#[cfg(target_arch = "arm")]
pub mod cortex_m;

#[cfg(feature = "std")]
pub mod host;

/// Task body handed to the kernel
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Callback the kernel's timer service invokes on expiry
pub type KernelTimerCallback = Box<dyn FnMut() + Send + 'static>;

/// Primitives of the underlying RTOS
pub trait Kernel: Send + Sync + 'static {
    type Task: Clone + PartialEq + Send + Sync;
    type Mutex: Clone + Send + Sync;
    type Sem: Clone + Send + Sync;
    type Queue: Clone + Send + Sync;
    type Timer: Clone + Send + Sync;

    // ============ CPU ============

    /// Index of the executing core, below `CFG_PROCESSORS_NUM`
    fn core_id(&self) -> usize;

    /// Whether the executing core is running interrupt code
    fn in_isr(&self) -> bool;

    /// Mask local interrupts, returning the previous state
    fn irq_save(&self) -> IrqState;

    /// Restore a state returned by [`Kernel::irq_save`]
    fn irq_restore(&self, state: IrqState);

    /// Request a context switch on interrupt exit
    fn yield_from_isr(&self);

    // ============ Scheduler ============

    fn start(&self);
    fn sched_state(&self) -> SchedState;
    fn suspend_all(&self);
    /// Returns `true` if resuming already switched context
    fn resume_all(&self) -> bool;
    fn tick_count(&self) -> Tick;
    fn max_priorities(&self) -> usize;

    // ============ Tasks ============

    fn task_create(
        &self,
        name: &str,
        entry: TaskEntry,
        prio: Prio,
        stack_size: usize,
        core: Option<usize>,
    ) -> Option<Self::Task>;
    /// Deleting the calling task does not return
    fn task_delete(&self, task: &Self::Task);
    fn task_delay(&self, ticks: Tick);
    fn task_yield(&self);
    fn task_suspend(&self, task: &Self::Task);
    fn task_resume(&self, task: &Self::Task);
    /// Returns `true` if a context switch is required
    fn task_resume_from_isr(&self, task: &Self::Task) -> bool;
    fn task_current(&self) -> Self::Task;
    fn task_name(&self, task: &Self::Task) -> String;

    // ============ Mutexes ============

    fn mutex_create(&self, recursive: bool) -> Option<Self::Mutex>;
    fn mutex_take(&self, mutex: &Self::Mutex, wait: Tick) -> bool;
    fn mutex_take_recursive(&self, mutex: &Self::Mutex, wait: Tick) -> bool;
    fn mutex_give(&self, mutex: &Self::Mutex) -> bool;
    fn mutex_give_recursive(&self, mutex: &Self::Mutex) -> bool;
    fn mutex_holder(&self, mutex: &Self::Mutex) -> Option<Self::Task>;
    fn mutex_delete(&self, mutex: &Self::Mutex);

    // ============ Counting semaphores ============

    fn sem_create(&self, max: SemCount, init: SemCount) -> Option<Self::Sem>;
    fn sem_take(&self, sem: &Self::Sem, wait: Tick) -> bool;
    fn sem_take_from_isr(&self, sem: &Self::Sem, woken: &mut bool) -> bool;
    fn sem_give(&self, sem: &Self::Sem) -> bool;
    fn sem_give_from_isr(&self, sem: &Self::Sem, woken: &mut bool) -> bool;
    fn sem_count(&self, sem: &Self::Sem) -> SemCount;
    fn sem_delete(&self, sem: &Self::Sem);

    // ============ Message queues ============

    fn queue_create(&self, msg_size: usize, capacity: usize) -> Option<Self::Queue>;
    fn queue_send(
        &self,
        queue: &Self::Queue,
        msg: &[u8],
        wait: Tick,
        pos: QueuePos,
        mode: SendMode,
    ) -> bool;
    fn queue_send_from_isr(
        &self,
        queue: &Self::Queue,
        msg: &[u8],
        pos: QueuePos,
        mode: SendMode,
        woken: &mut bool,
    ) -> bool;
    fn queue_recv(&self, queue: &Self::Queue, out: &mut [u8], wait: Tick, mode: RecvMode) -> bool;
    fn queue_recv_from_isr(
        &self,
        queue: &Self::Queue,
        out: &mut [u8],
        mode: RecvMode,
        woken: &mut bool,
    ) -> bool;
    fn queue_waiting(&self, queue: &Self::Queue) -> usize;
    fn queue_reset(&self, queue: &Self::Queue);
    fn queue_delete(&self, queue: &Self::Queue);

    // ============ Software timers ============

    fn timer_create(
        &self,
        name: &str,
        period: Tick,
        auto_reload: bool,
        callback: KernelTimerCallback,
    ) -> Option<Self::Timer>;
    fn timer_start(&self, timer: &Self::Timer, wait: Tick) -> bool;
    fn timer_start_from_isr(&self, timer: &Self::Timer, woken: &mut bool) -> bool;
    fn timer_stop(&self, timer: &Self::Timer, wait: Tick) -> bool;
    fn timer_stop_from_isr(&self, timer: &Self::Timer, woken: &mut bool) -> bool;
    /// Changing the period also (re)starts the timer
    fn timer_change_period(&self, timer: &Self::Timer, period: Tick, wait: Tick) -> bool;
    fn timer_change_period_from_isr(
        &self,
        timer: &Self::Timer,
        period: Tick,
        woken: &mut bool,
    ) -> bool;
    fn timer_is_active(&self, timer: &Self::Timer) -> bool;
    fn timer_delete(&self, timer: &Self::Timer, wait: Tick) -> bool;
}
