//! Host mutexes and counting semaphores

use std::sync::{Arc, Condvar, Mutex};

use super::task::{self, HostTask};
use super::{block_on, lock};
use crate::types::{SemCount, Tick};

// ============ Mutex ============

struct MutexState {
    holder: Option<HostTask>,
    depth: usize,
    waiters: usize,
}

struct MutexCtl {
    recursive: bool,
    state: Mutex<MutexState>,
    released: Condvar,
}

/// Mutex of the host kernel
#[derive(Clone)]
pub struct HostMutex(Arc<MutexCtl>);

impl HostMutex {
    pub(super) fn new(recursive: bool) -> Self {
        HostMutex(Arc::new(MutexCtl {
            recursive,
            state: Mutex::new(MutexState {
                holder: None,
                depth: 0,
                waiters: 0,
            }),
            released: Condvar::new(),
        }))
    }

    /// Take the mutex; a non-recursive take by the holder waits like any other
    pub(super) fn take(&self, wait: Tick, recursive: bool) -> bool {
        let me = task::current();
        let mut state = lock(&self.0.state);

        if recursive && self.0.recursive && state.holder.as_ref() == Some(&me) {
            state.depth += 1;
            return true;
        }

        let (mut state, free) = block_on(
            &self.0.released,
            state,
            wait,
            |state| &mut state.waiters,
            |state| state.holder.is_some(),
        );
        if !free {
            return false;
        }
        state.holder = Some(me);
        state.depth = 1;
        true
    }

    pub(super) fn give(&self, recursive: bool) -> bool {
        let me = task::current();
        let mut state = lock(&self.0.state);

        if state.holder.as_ref() != Some(&me) {
            return false;
        }

        state.depth = if recursive { state.depth.saturating_sub(1) } else { 0 };
        if state.depth == 0 {
            state.holder = None;
            self.0.released.notify_one();
        }
        true
    }

    pub(super) fn holder(&self) -> Option<HostTask> {
        lock(&self.0.state).holder.clone()
    }
}

// ============ Counting Semaphore ============

struct SemState {
    count: SemCount,
    waiters: usize,
}

struct SemCtl {
    max: SemCount,
    state: Mutex<SemState>,
    posted: Condvar,
}

/// Counting semaphore of the host kernel
#[derive(Clone)]
pub struct HostSem(Arc<SemCtl>);

impl HostSem {
    pub(super) fn new(max: SemCount, init: SemCount) -> Self {
        HostSem(Arc::new(SemCtl {
            max,
            state: Mutex::new(SemState { count: init, waiters: 0 }),
            posted: Condvar::new(),
        }))
    }

    pub(super) fn take(&self, wait: Tick) -> bool {
        let state = lock(&self.0.state);
        let (mut state, posted) = block_on(
            &self.0.posted,
            state,
            wait,
            |state| &mut state.waiters,
            |state| state.count == 0,
        );

        if posted {
            state.count -= 1;
        }
        posted
    }

    /// Returns whether a task was waiting, `None` if already at the maximum
    pub(super) fn give(&self) -> Option<bool> {
        let mut state = lock(&self.0.state);
        if state.count == self.0.max {
            return None;
        }

        state.count += 1;
        self.0.posted.notify_one();
        Some(state.waiters > 0)
    }

    pub(super) fn count(&self) -> SemCount {
        lock(&self.0.state).count
    }
}
