//! Host kernel - the kernel primitives simulated on OS threads
//!
//! Every task is a thread and every blocking primitive is a `Mutex` plus
//! `Condvar`. There are no priorities: a "higher priority task woken" flag
//! reports that an interrupt made any task ready. Interrupt context is
//! simulated per thread with [`HostKernel::isr`], and each core's interrupt
//! mask is a lock owned by the thread that masked it.
//!
//! Deleting or suspending another task takes effect when that task next
//! reaches a kernel call that may block, delay or yield.

mod queue;
mod sync;
mod task;
mod timer;

use std::cell::Cell;
use std::string::String;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

pub use self::queue::HostQueue;
pub use self::sync::{HostMutex, HostSem};
pub use self::task::HostTask;
pub use self::timer::HostTimer;

use self::timer::TimerService;
use crate::config::{CFG_MAX_DELAY, CFG_MAX_PRIORITIES, CFG_PROCESSORS_NUM, CFG_TICK_RATE_HZ};
use crate::port::{Kernel, KernelTimerCallback, TaskEntry};
use crate::types::{IrqState, Prio, QueuePos, RecvMode, SchedState, SemCount, SendMode, Tick};

std::thread_local! {
    static ISR_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CORE: Cell<usize> = const { Cell::new(0) };
}

// ============ Helpers ============

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn tick_duration(ticks: Tick) -> Duration {
    Duration::from_micros(u64::from(ticks) * 1_000_000 / u64::from(CFG_TICK_RATE_HZ))
}

/// Wait on `cv` while `blocked` holds, for at most `wait` ticks
///
/// The caller is counted in `waiters` until it stops waiting, also when it
/// unwinds because it was deleted. Returns the guard and whether the
/// condition cleared in time. Wakes at least once per tick to notice the
/// calling task being deleted.
pub(crate) fn block_on<'a, T>(
    cv: &Condvar,
    mut guard: MutexGuard<'a, T>,
    wait: Tick,
    waiters: fn(&mut T) -> &mut usize,
    mut blocked: impl FnMut(&mut T) -> bool,
) -> (MutexGuard<'a, T>, bool) {
    let deadline = (wait != CFG_MAX_DELAY).then(|| Instant::now() + tick_duration(wait));
    let slice = tick_duration(1);
    *waiters(&mut guard) += 1;

    loop {
        if !blocked(&mut guard) {
            *waiters(&mut guard) -= 1;
            return (guard, true);
        }

        let now = Instant::now();
        let timeout = match deadline {
            Some(deadline) if now >= deadline => {
                *waiters(&mut guard) -= 1;
                return (guard, false);
            }
            Some(deadline) => (deadline - now).min(slice),
            None => slice,
        };

        guard = match cv.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };

        if task::deletion_pending() {
            *waiters(&mut guard) -= 1;
            drop(guard);
            task::unwind_deleted();
        }
    }
}

// ============ Interrupt Lines ============

/// One core's interrupt mask
struct IrqLine {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
    disables: AtomicUsize,
    enables: AtomicUsize,
}

impl IrqLine {
    fn new() -> Self {
        IrqLine {
            owner: Mutex::new(None),
            released: Condvar::new(),
            disables: AtomicUsize::new(0),
            enables: AtomicUsize::new(0),
        }
    }

    fn save(&self) -> IrqState {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        if *owner == Some(me) {
            return IrqState::MASKED;
        }

        while owner.is_some() {
            owner = self.released.wait(owner).unwrap_or_else(PoisonError::into_inner);
        }
        *owner = Some(me);
        self.disables.fetch_add(1, Ordering::Relaxed);
        IrqState::ENABLED
    }

    fn restore(&self, state: IrqState) {
        if !state.was_enabled() {
            return;
        }

        let mut owner = lock(&self.owner);
        if *owner == Some(thread::current().id()) {
            *owner = None;
            self.enables.fetch_add(1, Ordering::Relaxed);
            self.released.notify_all();
        }
    }
}

// ============ Host Kernel ============

/// Kernel simulated on the host's threads
pub struct HostKernel {
    epoch: Instant,
    started: AtomicBool,
    suspended: AtomicUsize,
    isr_yields: AtomicUsize,
    irq: [IrqLine; CFG_PROCESSORS_NUM],
    timers: Arc<TimerService>,
}

impl HostKernel {
    pub fn new() -> Self {
        HostKernel {
            epoch: Instant::now(),
            started: AtomicBool::new(false),
            suspended: AtomicUsize::new(0),
            isr_yields: AtomicUsize::new(0),
            irq: core::array::from_fn(|_| IrqLine::new()),
            timers: Arc::new(TimerService::default()),
        }
    }

    /// Run `f` as an interrupt handler on the calling thread
    pub fn isr<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Exit;
        impl Drop for Exit {
            fn drop(&mut self) {
                ISR_DEPTH.with(|depth| depth.set(depth.get() - 1));
            }
        }

        ISR_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let _exit = Exit;
        f()
    }

    /// Context switches requested from interrupt handlers so far
    pub fn yield_from_isr_count(&self) -> usize {
        self.isr_yields.load(Ordering::Relaxed)
    }

    /// Times interrupts on `core` went from enabled to masked
    pub fn irq_disable_count(&self, core: usize) -> usize {
        self.irq[core].disables.load(Ordering::Relaxed)
    }

    /// Times interrupts on `core` went from masked to enabled
    pub fn irq_enable_count(&self, core: usize) -> usize {
        self.irq[core].enables.load(Ordering::Relaxed)
    }
}

impl Default for HostKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HostKernel {
    fn drop(&mut self) {
        self.timers.shutdown();
    }
}

impl Kernel for HostKernel {
    type Task = HostTask;
    type Mutex = HostMutex;
    type Sem = HostSem;
    type Queue = HostQueue;
    type Timer = HostTimer;

    // ============ CPU ============

    fn core_id(&self) -> usize {
        CORE.with(Cell::get)
    }

    fn in_isr(&self) -> bool {
        ISR_DEPTH.with(Cell::get) > 0
    }

    fn irq_save(&self) -> IrqState {
        self.irq[self.core_id()].save()
    }

    fn irq_restore(&self, state: IrqState) {
        self.irq[self.core_id()].restore(state);
    }

    fn yield_from_isr(&self) {
        self.isr_yields.fetch_add(1, Ordering::Relaxed);
    }

    // ============ Scheduler ============

    fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    fn sched_state(&self) -> SchedState {
        if !self.started.load(Ordering::Acquire) {
            SchedState::NotStarted
        } else if self.suspended.load(Ordering::Acquire) > 0 {
            SchedState::Suspended
        } else {
            SchedState::Running
        }
    }

    fn suspend_all(&self) {
        self.suspended.fetch_add(1, Ordering::AcqRel);
    }

    fn resume_all(&self) -> bool {
        let _ = self
            .suspended
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        false
    }

    fn tick_count(&self) -> Tick {
        let ticks = self.epoch.elapsed().as_millis() * u128::from(CFG_TICK_RATE_HZ) / 1000;
        // wraps like a hardware tick counter
        ticks as Tick
    }

    fn max_priorities(&self) -> usize {
        CFG_MAX_PRIORITIES
    }

    // ============ Tasks ============

    fn task_create(
        &self,
        name: &str,
        entry: TaskEntry,
        prio: Prio,
        stack_size: usize,
        core: Option<usize>,
    ) -> Option<HostTask> {
        task::spawn(name, entry, prio, stack_size, core)
    }

    fn task_delete(&self, task: &HostTask) {
        task.delete();
    }

    fn task_delay(&self, ticks: Tick) {
        task::delay(ticks);
    }

    fn task_yield(&self) {
        task::checkpoint();
        thread::yield_now();
    }

    fn task_suspend(&self, task: &HostTask) {
        task.suspend();
    }

    fn task_resume(&self, task: &HostTask) {
        task.resume();
    }

    fn task_resume_from_isr(&self, task: &HostTask) -> bool {
        task.resume()
    }

    fn task_current(&self) -> HostTask {
        task::current()
    }

    fn task_name(&self, task: &HostTask) -> String {
        String::from(task.name())
    }

    // ============ Mutexes ============

    fn mutex_create(&self, recursive: bool) -> Option<HostMutex> {
        Some(HostMutex::new(recursive))
    }

    fn mutex_take(&self, mutex: &HostMutex, wait: Tick) -> bool {
        mutex.take(wait, false)
    }

    fn mutex_take_recursive(&self, mutex: &HostMutex, wait: Tick) -> bool {
        mutex.take(wait, true)
    }

    fn mutex_give(&self, mutex: &HostMutex) -> bool {
        mutex.give(false)
    }

    fn mutex_give_recursive(&self, mutex: &HostMutex) -> bool {
        mutex.give(true)
    }

    fn mutex_holder(&self, mutex: &HostMutex) -> Option<HostTask> {
        mutex.holder()
    }

    fn mutex_delete(&self, _mutex: &HostMutex) {}

    // ============ Counting semaphores ============

    fn sem_create(&self, max: SemCount, init: SemCount) -> Option<HostSem> {
        (init <= max).then(|| HostSem::new(max, init))
    }

    fn sem_take(&self, sem: &HostSem, wait: Tick) -> bool {
        sem.take(wait)
    }

    fn sem_take_from_isr(&self, sem: &HostSem, _woken: &mut bool) -> bool {
        sem.take(0)
    }

    fn sem_give(&self, sem: &HostSem) -> bool {
        sem.give().is_some()
    }

    fn sem_give_from_isr(&self, sem: &HostSem, woken: &mut bool) -> bool {
        match sem.give() {
            Some(waiters) => {
                *woken = waiters;
                true
            }
            None => false,
        }
    }

    fn sem_count(&self, sem: &HostSem) -> SemCount {
        sem.count()
    }

    fn sem_delete(&self, _sem: &HostSem) {}

    // ============ Message queues ============

    fn queue_create(&self, msg_size: usize, capacity: usize) -> Option<HostQueue> {
        HostQueue::new(msg_size, capacity)
    }

    fn queue_send(
        &self,
        queue: &HostQueue,
        msg: &[u8],
        wait: Tick,
        pos: QueuePos,
        mode: SendMode,
    ) -> bool {
        queue.send(msg, wait, pos, mode).is_some()
    }

    fn queue_send_from_isr(
        &self,
        queue: &HostQueue,
        msg: &[u8],
        pos: QueuePos,
        mode: SendMode,
        woken: &mut bool,
    ) -> bool {
        match queue.send(msg, 0, pos, mode) {
            Some(waiters) => {
                *woken = waiters;
                true
            }
            None => false,
        }
    }

    fn queue_recv(&self, queue: &HostQueue, out: &mut [u8], wait: Tick, mode: RecvMode) -> bool {
        queue.recv(out, wait, mode).is_some()
    }

    fn queue_recv_from_isr(
        &self,
        queue: &HostQueue,
        out: &mut [u8],
        mode: RecvMode,
        woken: &mut bool,
    ) -> bool {
        match queue.recv(out, 0, mode) {
            Some(waiters) => {
                *woken = waiters;
                true
            }
            None => false,
        }
    }

    fn queue_waiting(&self, queue: &HostQueue) -> usize {
        queue.waiting()
    }

    fn queue_reset(&self, queue: &HostQueue) {
        queue.reset();
    }

    fn queue_delete(&self, _queue: &HostQueue) {}

    // ============ Software timers ============

    fn timer_create(
        &self,
        name: &str,
        period: Tick,
        auto_reload: bool,
        callback: KernelTimerCallback,
    ) -> Option<HostTimer> {
        if period == 0 {
            return None;
        }
        Some(self.timers.create(name, period, auto_reload, callback))
    }

    fn timer_start(&self, timer: &HostTimer, _wait: Tick) -> bool {
        self.timers.start(timer, None)
    }

    fn timer_start_from_isr(&self, timer: &HostTimer, _woken: &mut bool) -> bool {
        self.timers.start(timer, None)
    }

    fn timer_stop(&self, timer: &HostTimer, _wait: Tick) -> bool {
        self.timers.stop(timer)
    }

    fn timer_stop_from_isr(&self, timer: &HostTimer, _woken: &mut bool) -> bool {
        self.timers.stop(timer)
    }

    fn timer_change_period(&self, timer: &HostTimer, period: Tick, _wait: Tick) -> bool {
        period != 0 && self.timers.start(timer, Some(period))
    }

    fn timer_change_period_from_isr(
        &self,
        timer: &HostTimer,
        period: Tick,
        _woken: &mut bool,
    ) -> bool {
        period != 0 && self.timers.start(timer, Some(period))
    }

    fn timer_is_active(&self, timer: &HostTimer) -> bool {
        timer.is_active()
    }

    fn timer_delete(&self, timer: &HostTimer, _wait: Tick) -> bool {
        self.timers.delete(timer)
    }
}
