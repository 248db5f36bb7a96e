//! Host software timers
//!
//! One service thread, spawned with the first timer, sleeps until the
//! earliest expiry and runs due callbacks outside of every lock, so a
//! callback may start, stop or delete timers, its own included.

use std::string::String;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;
use std::vec::Vec;

use portable_atomic::{AtomicU64, Ordering};

use super::task::{self, HostTask};
use super::{lock, tick_duration};
use crate::config::CFG_TIMER_SERVICE_NAME;
use crate::port::KernelTimerCallback;
use crate::types::Tick;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Schedule {
    period: Tick,
    auto_reload: bool,
    expiry: Option<Instant>,
    deleted: bool,
}

struct TimerCtl {
    id: u64,
    schedule: Mutex<Schedule>,
    /// Empty while the service runs it, and for good once deleted
    callback: Mutex<Option<KernelTimerCallback>>,
}

/// Software timer of the host kernel
#[derive(Clone)]
pub struct HostTimer(Arc<TimerCtl>);

impl HostTimer {
    pub(super) fn is_active(&self) -> bool {
        lock(&self.0.schedule).expiry.is_some()
    }

    /// Run the callback and re-arm a periodic timer, if it is due at `now`
    fn fire(&self, now: Instant) -> bool {
        let mut schedule = lock(&self.0.schedule);
        match schedule.expiry {
            Some(expiry) if expiry <= now => {
                let next = (expiry + tick_duration(schedule.period)).max(now);
                schedule.expiry = schedule.auto_reload.then_some(next);
                true
            }
            _ => false,
        }
    }

    fn run_callback(&self) {
        let Some(mut callback) = lock(&self.0.callback).take() else {
            return;
        };

        callback();

        let mut slot = lock(&self.0.callback);
        if !lock(&self.0.schedule).deleted {
            *slot = Some(callback);
        }
    }
}

#[derive(Default)]
struct ServiceState {
    timers: Vec<HostTimer>,
    running: bool,
    shutdown: bool,
}

/// The timer service task and the timers it watches
#[derive(Default)]
pub(super) struct TimerService {
    state: Mutex<ServiceState>,
    changed: Condvar,
}

impl TimerService {
    pub(super) fn create(
        self: &Arc<Self>,
        name: &str,
        period: Tick,
        auto_reload: bool,
        callback: KernelTimerCallback,
    ) -> HostTimer {
        let timer = HostTimer(Arc::new(TimerCtl {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            schedule: Mutex::new(Schedule {
                period,
                auto_reload,
                expiry: None,
                deleted: false,
            }),
            callback: Mutex::new(Some(callback)),
        }));
        crate::trace!("host: timer {} '{}' created", timer.0.id, name);

        let mut state = lock(&self.state);
        state.timers.push(timer.clone());
        if !state.running {
            state.running = true;
            let service = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name(String::from(CFG_TIMER_SERVICE_NAME))
                .spawn(move || service.run());
            state.running = spawned.is_ok();
        }
        timer
    }

    /// Arm `timer` one period from now, switching to `period` if given
    pub(super) fn start(&self, timer: &HostTimer, period: Option<Tick>) -> bool {
        {
            let mut schedule = lock(&timer.0.schedule);
            if schedule.deleted {
                return false;
            }
            if let Some(period) = period {
                schedule.period = period;
            }
            schedule.expiry = Some(Instant::now() + tick_duration(schedule.period));
        }
        self.kick();
        true
    }

    pub(super) fn stop(&self, timer: &HostTimer) -> bool {
        {
            let mut schedule = lock(&timer.0.schedule);
            if schedule.deleted {
                return false;
            }
            schedule.expiry = None;
        }
        self.kick();
        true
    }

    pub(super) fn delete(&self, timer: &HostTimer) -> bool {
        {
            let mut schedule = lock(&timer.0.schedule);
            if schedule.deleted {
                return false;
            }
            schedule.deleted = true;
            schedule.expiry = None;
        }
        drop(lock(&timer.0.callback).take());

        lock(&self.state).timers.retain(|t| !Arc::ptr_eq(&t.0, &timer.0));
        self.changed.notify_all();
        true
    }

    pub(super) fn shutdown(&self) {
        lock(&self.state).shutdown = true;
        self.changed.notify_all();
    }

    fn kick(&self) {
        let _state = lock(&self.state);
        self.changed.notify_all();
    }

    fn run(&self) {
        task::bind(HostTask::service(CFG_TIMER_SERVICE_NAME));
        crate::trace!("host: timer service started");

        let mut state = lock(&self.state);
        while !state.shutdown {
            let now = Instant::now();
            let due: Vec<HostTimer> =
                state.timers.iter().filter(|t| t.fire(now)).cloned().collect();

            if !due.is_empty() {
                drop(state);
                for timer in &due {
                    timer.run_callback();
                }
                state = lock(&self.state);
                continue;
            }

            let next = state
                .timers
                .iter()
                .filter_map(|t| lock(&t.0.schedule).expiry)
                .min();
            state = match next {
                Some(next) => {
                    let timeout = next.saturating_duration_since(now);
                    match self.changed.wait_timeout(state, timeout) {
                        Ok((state, _)) => state,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => self
                    .changed
                    .wait(state)
                    .unwrap_or_else(std::sync::PoisonError::into_inner),
            };
        }
        crate::trace!("host: timer service stopped");
    }
}
