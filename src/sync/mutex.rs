//! Mutex implementation
//!
//! A mutex is either normal or recursive for its whole life; the type given
//! at creation selects the kernel calls every later lock and unlock uses.
//! Mutexes may sleep, so none of these operations run in interrupt context.

use alloc::string::String;

use crate::core::kernel::Espos;
use crate::core::registry::handle_type;
use crate::error::{EsposError, EsposResult};
use crate::port::Kernel;
use crate::task::TaskHandle;
use crate::types::{MutexType, Tick};

handle_type!(
    /// Mutex handle
    MutexHandle
);

pub(crate) struct MutexRecord<K: Kernel> {
    raw: K::Mutex,
    kind: MutexType,
    name: String,
}

impl<K: Kernel> Clone for MutexRecord<K> {
    fn clone(&self) -> Self {
        MutexRecord {
            raw: self.raw.clone(),
            kind: self.kind,
            name: self.name.clone(),
        }
    }
}

impl<K: Kernel> Espos<K> {
    /// Create a mutex of the given type
    pub fn mutex_create(&self, kind: MutexType) -> EsposResult<MutexHandle> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let raw = self
            .kernel
            .mutex_create(kind == MutexType::Recursive)
            .ok_or(EsposError::OutOfMemory)?;

        let record = MutexRecord {
            raw: raw.clone(),
            kind,
            name: String::new(),
        };
        match self.mutexes.insert(record) {
            Ok(handle) => {
                crate::trace!("espos: mutex {} created", handle.get());
                Ok(MutexHandle(handle))
            }
            Err(e) => {
                self.kernel.mutex_delete(&raw);
                Err(e)
            }
        }
    }

    /// Lock a mutex, waiting at most `wait` ticks
    ///
    /// # Returns
    /// * `Err(EsposError::Timeout)` - Still held by another task after `wait`
    /// * `Err(EsposError::CalledFromIsr)` - Called from an interrupt handler
    pub fn mutex_lock(&self, mutex: MutexHandle, wait: Tick) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let record = self.mutex_record(mutex)?;
        let taken = match record.kind {
            MutexType::Normal => self.kernel.mutex_take(&record.raw, wait),
            MutexType::Recursive => self.kernel.mutex_take_recursive(&record.raw, wait),
        };

        if taken {
            Ok(())
        } else {
            Err(EsposError::Timeout)
        }
    }

    /// Unlock a mutex held by the calling task
    ///
    /// # Returns
    /// * `Err(EsposError::PermissionDenied)` - The caller is not the holder
    /// * `Err(EsposError::CalledFromIsr)` - Called from an interrupt handler
    pub fn mutex_unlock(&self, mutex: MutexHandle) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let record = self.mutex_record(mutex)?;
        let current = self.kernel.task_current();
        if self.kernel.mutex_holder(&record.raw).as_ref() != Some(&current) {
            return Err(EsposError::PermissionDenied);
        }

        let given = match record.kind {
            MutexType::Normal => self.kernel.mutex_give(&record.raw),
            MutexType::Recursive => self.kernel.mutex_give_recursive(&record.raw),
        };

        if given {
            Ok(())
        } else {
            Err(EsposError::PermissionDenied)
        }
    }

    /// Task holding a mutex, `None` when unlocked
    ///
    /// A snapshot; the holder may change before the caller looks at it.
    pub fn mutex_get_holder(&self, mutex: MutexHandle) -> EsposResult<Option<TaskHandle>> {
        let record = self.mutex_record(mutex)?;
        match self.kernel.mutex_holder(&record.raw) {
            Some(task) => self.task_handle_of(&task).map(Some),
            None => Ok(None),
        }
    }

    /// Label a mutex
    pub fn mutex_set_name(&self, mutex: MutexHandle, name: &str) -> EsposResult<()> {
        self.mutexes
            .with(mutex.0, |record| record.name = String::from(name))
            .ok_or(EsposError::InvalidArgument)
    }

    /// Label given by [`Espos::mutex_set_name`], empty by default
    pub fn mutex_get_name(&self, mutex: MutexHandle) -> EsposResult<String> {
        self.mutex_record(mutex).map(|record| record.name)
    }

    /// Delete a mutex
    pub fn mutex_del(&self, mutex: MutexHandle) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let record = self.mutexes.remove(mutex.0).ok_or(EsposError::InvalidArgument)?;
        self.kernel.mutex_delete(&record.raw);
        crate::trace!("espos: mutex {} deleted", mutex.as_raw());
        Ok(())
    }

    fn mutex_record(&self, mutex: MutexHandle) -> EsposResult<MutexRecord<K>> {
        self.mutexes.get(mutex.0).ok_or(EsposError::InvalidArgument)
    }
}
