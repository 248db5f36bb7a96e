//! Task management module
//!
//! Provides task creation, deletion, and control functions.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;

use crate::config::CFG_PROCESSORS_NUM;
use crate::core::kernel::Espos;
use crate::core::registry::{handle_type, RawHandle, Registry};
use crate::error::{EsposError, EsposResult};
use crate::port::{Kernel, TaskEntry};
use crate::types::{Prio, Tick};

handle_type!(
    /// Task handle
    TaskHandle
);

/// What the layer remembers about a task
pub(crate) struct TaskRecord<K: Kernel> {
    pub(crate) raw: K::Task,
    pub(crate) name: String,
}

impl<K: Kernel> Clone for TaskRecord<K> {
    fn clone(&self) -> Self {
        TaskRecord {
            raw: self.raw.clone(),
            name: self.name.clone(),
        }
    }
}

/// Drops the registry entry of a task whose body has finished
struct TaskExit<K: Kernel> {
    tasks: Arc<Registry<TaskRecord<K>>>,
    handle: RawHandle,
}

/// Fill a reserved task slot unless it was filled or released already
fn register_task<K: Kernel>(
    tasks: &Registry<TaskRecord<K>>,
    handle: RawHandle,
    kernel: &K,
    raw: K::Task,
) {
    let record = TaskRecord {
        name: kernel.task_name(&raw),
        raw,
    };
    let _ = tasks.fill(handle, record);
}

impl<K: Kernel> Drop for TaskExit<K> {
    fn drop(&mut self) {
        if self.tasks.remove(self.handle).is_some() {
            crate::trace!("espos: task {} exited", self.handle.get());
        }
    }
}

impl<K: Kernel> Espos<K> {
    /// Create a new task
    ///
    /// # Arguments
    /// * `name` - Task name, truncated by the kernel if too long
    /// * `entry` - Task body; its captures are the task argument
    /// * `prio` - Task priority, at most [`Espos::task_prio_num`] minus two
    /// * `stack_size` - Stack size, in kernel units
    /// * `affinity` - Core to pin the task to, `None` to let the kernel pick
    ///
    /// The task is forgotten when its body returns or it is deleted.
    pub fn task_create<F>(
        &self,
        name: &str,
        entry: F,
        prio: Prio,
        stack_size: usize,
        affinity: Option<usize>,
    ) -> EsposResult<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        if name.is_empty() || stack_size == 0 || usize::from(prio) >= self.kernel.max_priorities() {
            return Err(EsposError::InvalidArgument);
        }

        if affinity.is_some_and(|core| core >= CFG_PROCESSORS_NUM) {
            return Err(EsposError::InvalidArgument);
        }

        let handle = self.tasks.reserve()?;
        let exit = TaskExit {
            tasks: Arc::clone(&self.tasks),
            handle,
        };
        let kernel = Arc::clone(&self.kernel);
        let body: TaskEntry = Box::new(move || {
            // the task may run before task_create returns
            register_task(&exit.tasks, exit.handle, &*kernel, kernel.task_current());
            drop(kernel);
            entry();
            drop(exit);
        });

        let Some(raw) = self.kernel.task_create(name, body, prio, stack_size, affinity) else {
            self.tasks.remove(handle);
            return Err(EsposError::OutOfMemory);
        };
        // no-op if the task registered itself, or already finished
        register_task(&self.tasks, handle, &*self.kernel, raw);

        crate::debug!("espos: task {} created, prio {}", handle.get(), prio);
        Ok(TaskHandle(handle))
    }

    /// Delete a task; `None` deletes the caller and does not return
    pub fn task_del(&self, task: Option<TaskHandle>) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let task = match task {
            Some(task) => task,
            None => self.task_get_current()?,
        };
        let record = self.tasks.remove(task.0).ok_or(EsposError::InvalidArgument)?;

        crate::debug!("espos: task {} deleted", task.as_raw());
        self.kernel.task_delete(&record.raw);
        Ok(())
    }

    /// Block the calling task for `ticks`
    #[inline]
    pub fn task_delay(&self, ticks: Tick) {
        self.kernel.task_delay(ticks);
    }

    /// Let other ready tasks of the same priority run
    #[inline]
    pub fn task_yield(&self) {
        self.kernel.task_yield();
    }

    /// Suspend a task until [`Espos::task_resume`]
    pub fn task_suspend(&self, task: TaskHandle) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let raw = self.task_raw(task)?;
        self.kernel.task_suspend(&raw);
        Ok(())
    }

    /// Resume a suspended task
    ///
    /// From an interrupt handler the ISR variant is used and a context switch
    /// is requested if the resumed task must run first.
    pub fn task_resume(&self, task: TaskHandle) -> EsposResult<()> {
        let raw = self.task_raw(task)?;

        self.dispatch(
            |woken| {
                *woken = self.kernel.task_resume_from_isr(&raw);
                Ok(())
            },
            || {
                self.kernel.task_resume(&raw);
                Ok(())
            },
        )
    }

    /// Handle of the calling task
    ///
    /// Threads of execution the layer did not create, such as the one that
    /// started the scheduler, get a handle the first time they ask.
    pub fn task_get_current(&self) -> EsposResult<TaskHandle> {
        let raw = self.kernel.task_current();
        self.task_handle_of(&raw)
    }

    /// Name of a task
    pub fn task_get_name(&self, task: TaskHandle) -> EsposResult<String> {
        self.tasks
            .get(task.0)
            .map(|record| record.name)
            .ok_or(EsposError::InvalidArgument)
    }

    /// Number of priority levels, counting the slot the kernel reserves
    #[inline]
    pub fn task_prio_num(&self) -> usize {
        self.kernel.max_priorities() + 1
    }

    fn task_raw(&self, task: TaskHandle) -> EsposResult<K::Task> {
        self.tasks
            .with(task.0, |record| record.raw.clone())
            .ok_or(EsposError::InvalidArgument)
    }

    pub(crate) fn task_handle_of(&self, raw: &K::Task) -> EsposResult<TaskHandle> {
        self.tasks
            .find_or_insert(
                |record| record.raw == *raw,
                || TaskRecord {
                    raw: raw.clone(),
                    name: self.kernel.task_name(raw),
                },
            )
            .map(TaskHandle)
    }
}
