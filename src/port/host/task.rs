//! Host tasks
//!
//! A task is a thread plus a control block holding its suspend and delete
//! requests. Threads the kernel did not spawn, such as a test's main thread,
//! become tasks the first time they ask for their own task.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::string::String;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;

use portable_atomic::{AtomicU64, Ordering};

use super::{lock, tick_duration, CORE};
use crate::config::{
    CFG_HOST_STACK_MIN, CFG_MAX_DELAY, CFG_MAX_PRIORITIES, CFG_PROCESSORS_NUM, CFG_TASK_NAME_LEN,
};
use crate::port::TaskEntry;
use crate::types::{Prio, Tick};

std::thread_local! {
    static CURRENT: RefCell<Option<HostTask>> = const { RefCell::new(None) };
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unwind payload of a deleted task
struct TaskDeleted;

#[derive(Default)]
struct Requests {
    suspended: bool,
    deleted: bool,
}

struct TaskCtl {
    id: u64,
    name: String,
    prio: Prio,
    requests: Mutex<Requests>,
    wake: Condvar,
}

/// Task of the host kernel
#[derive(Clone)]
pub struct HostTask(Arc<TaskCtl>);

impl PartialEq for HostTask {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for HostTask {}

impl core::fmt::Debug for HostTask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostTask")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .finish()
    }
}

impl HostTask {
    fn new(name: &str, prio: Prio) -> Self {
        HostTask(Arc::new(TaskCtl {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: truncate(name),
            prio,
            requests: Mutex::new(Requests::default()),
            wake: Condvar::new(),
        }))
    }

    /// Task of a kernel-internal thread
    pub(super) fn service(name: &str) -> Self {
        HostTask::new(name, (CFG_MAX_PRIORITIES - 1) as Prio)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn prio(&self) -> Prio {
        self.0.prio
    }

    pub(super) fn delete(&self) {
        lock(&self.0.requests).deleted = true;
        self.0.wake.notify_all();

        if *self == current() {
            unwind_deleted();
        }
    }

    pub(super) fn suspend(&self) {
        lock(&self.0.requests).suspended = true;

        if *self == current() {
            checkpoint();
        }
    }

    /// Returns `true` if the task was suspended
    pub(super) fn resume(&self) -> bool {
        let was_suspended = core::mem::take(&mut lock(&self.0.requests).suspended);
        self.0.wake.notify_all();
        was_suspended
    }
}

/// Keeps at most `CFG_TASK_NAME_LEN - 1` bytes, on a char boundary
fn truncate(name: &str) -> String {
    let mut end = name.len().min(CFG_TASK_NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}

/// Task of the calling thread, adopting the thread if needed
pub(super) fn current() -> HostTask {
    CURRENT.with(|current| {
        current
            .borrow_mut()
            .get_or_insert_with(|| HostTask::new(thread::current().name().unwrap_or("main"), 0))
            .clone()
    })
}

/// Run the calling thread as `task`
pub(super) fn bind(task: HostTask) {
    CURRENT.with(|current| *current.borrow_mut() = Some(task));
}

pub(super) fn deletion_pending() -> bool {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|task| lock(&task.0.requests).deleted)
    })
}

pub(super) fn unwind_deleted() -> ! {
    panic::resume_unwind(Box::new(TaskDeleted))
}

/// Act on pending delete and suspend requests of the calling task
pub(super) fn checkpoint() {
    let Some(task) = CURRENT.with(|current| current.borrow().clone()) else {
        return;
    };

    let mut requests = lock(&task.0.requests);
    loop {
        if requests.deleted {
            drop(requests);
            unwind_deleted();
        }
        if !requests.suspended {
            return;
        }
        requests = task.0.wake.wait(requests).unwrap_or_else(std::sync::PoisonError::into_inner);
    }
}

pub(super) fn delay(ticks: Tick) {
    if ticks == 0 {
        checkpoint();
        thread::yield_now();
        return;
    }

    let task = current();
    let deadline = (ticks != CFG_MAX_DELAY).then(|| Instant::now() + tick_duration(ticks));
    let mut requests = lock(&task.0.requests);
    loop {
        if requests.deleted {
            break;
        }
        let timeout = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => left,
                _ => break,
            },
            None => tick_duration(CFG_MAX_DELAY),
        };
        requests = match task.0.wake.wait_timeout(requests, timeout) {
            Ok((requests, _)) => requests,
            Err(poisoned) => poisoned.into_inner().0,
        };
    }
    drop(requests);
    checkpoint();
}

pub(super) fn spawn(
    name: &str,
    entry: TaskEntry,
    prio: Prio,
    stack_size: usize,
    core: Option<usize>,
) -> Option<HostTask> {
    let task = HostTask::new(name, prio);
    let core = core.unwrap_or((task.0.id as usize) % CFG_PROCESSORS_NUM);
    let me = task.clone();

    let spawned = thread::Builder::new()
        .name(String::from(task.name()))
        .stack_size(stack_size.max(CFG_HOST_STACK_MIN))
        .spawn(move || {
            CORE.with(|id| id.set(core));
            let id = me.0.id;
            bind(me);
            crate::trace!("host: task {} running on core {}", id, core);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                checkpoint();
                entry();
            }));
            match outcome {
                Ok(()) => {
                    crate::trace!("host: task {} returned", id);
                }
                Err(payload) if payload.is::<TaskDeleted>() => {
                    crate::trace!("host: task {} deleted", id);
                }
                Err(payload) => panic::resume_unwind(payload),
            }
        });

    spawned.ok().map(|_| task)
}
