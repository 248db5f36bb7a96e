//! Semaphore implementation
//!
//! Counting semaphores for task synchronization and resource counting.
//! Take and give work from interrupt handlers too, without blocking.

use alloc::string::String;

use crate::core::kernel::Espos;
use crate::core::registry::handle_type;
use crate::error::{EsposError, EsposResult};
use crate::port::Kernel;
use crate::types::{SemCount, Tick};

handle_type!(
    /// Counting semaphore handle
    SemHandle
);

pub(crate) struct SemRecord<K: Kernel> {
    raw: K::Sem,
    name: String,
}

impl<K: Kernel> Clone for SemRecord<K> {
    fn clone(&self) -> Self {
        SemRecord {
            raw: self.raw.clone(),
            name: self.name.clone(),
        }
    }
}

impl<K: Kernel> Espos<K> {
    /// Create a counting semaphore
    ///
    /// # Arguments
    /// * `max` - Highest count, at least 1
    /// * `init` - Initial count, at most `max`
    pub fn sem_create(&self, max: SemCount, init: SemCount) -> EsposResult<SemHandle> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        if max == 0 || init > max {
            return Err(EsposError::InvalidArgument);
        }

        let raw = self.kernel.sem_create(max, init).ok_or(EsposError::OutOfMemory)?;
        let record = SemRecord {
            raw: raw.clone(),
            name: String::new(),
        };
        match self.sems.insert(record) {
            Ok(handle) => {
                crate::trace!("espos: sem {} created, max {} init {}", handle.get(), max, init);
                Ok(SemHandle(handle))
            }
            Err(e) => {
                self.kernel.sem_delete(&raw);
                Err(e)
            }
        }
    }

    /// Take (pend on) a semaphore
    ///
    /// From an interrupt handler the take never waits and `wait` is ignored.
    ///
    /// # Returns
    /// * `Err(EsposError::Timeout)` - Count still zero after `wait`
    pub fn sem_take(&self, sem: SemHandle, wait: Tick) -> EsposResult<()> {
        let raw = self.sem_raw(sem)?;

        self.dispatch(
            |woken| {
                if self.kernel.sem_take_from_isr(&raw, woken) {
                    Ok(())
                } else {
                    Err(EsposError::Timeout)
                }
            },
            || {
                if self.kernel.sem_take(&raw, wait) {
                    Ok(())
                } else {
                    Err(EsposError::Timeout)
                }
            },
        )
    }

    /// Give (post) a semaphore
    ///
    /// # Returns
    /// * `Err(EsposError::ResourceBusy)` - Already at its maximum count
    pub fn sem_give(&self, sem: SemHandle) -> EsposResult<()> {
        let raw = self.sem_raw(sem)?;

        self.dispatch(
            |woken| {
                if self.kernel.sem_give_from_isr(&raw, woken) {
                    Ok(())
                } else {
                    Err(EsposError::ResourceBusy)
                }
            },
            || {
                if self.kernel.sem_give(&raw) {
                    Ok(())
                } else {
                    Err(EsposError::ResourceBusy)
                }
            },
        )
    }

    /// Current count of a semaphore
    #[inline]
    pub fn sem_count(&self, sem: SemHandle) -> EsposResult<SemCount> {
        let raw = self.sem_raw(sem)?;
        Ok(self.kernel.sem_count(&raw))
    }

    /// Label a semaphore
    pub fn sem_set_name(&self, sem: SemHandle, name: &str) -> EsposResult<()> {
        self.sems
            .with(sem.0, |record| record.name = String::from(name))
            .ok_or(EsposError::InvalidArgument)
    }

    /// Label given by [`Espos::sem_set_name`], empty by default
    pub fn sem_get_name(&self, sem: SemHandle) -> EsposResult<String> {
        self.sem_record(sem).map(|record| record.name)
    }

    /// Delete a semaphore
    pub fn sem_del(&self, sem: SemHandle) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let record = self.sems.remove(sem.0).ok_or(EsposError::InvalidArgument)?;
        self.kernel.sem_delete(&record.raw);
        crate::trace!("espos: sem {} deleted", sem.as_raw());
        Ok(())
    }

    fn sem_record(&self, sem: SemHandle) -> EsposResult<SemRecord<K>> {
        self.sems.get(sem.0).ok_or(EsposError::InvalidArgument)
    }

    /// Kernel semaphore alone; never allocates, so interrupt paths use it
    fn sem_raw(&self, sem: SemHandle) -> EsposResult<K::Sem> {
        self.sems
            .with(sem.0, |record| record.raw.clone())
            .ok_or(EsposError::InvalidArgument)
    }
}
