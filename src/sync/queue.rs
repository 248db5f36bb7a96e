//! Message queue implementation
//!
//! Fixed-capacity queues of fixed-size messages. Messages are copied in and
//! out whole; every buffer must be exactly the queue's message size.

use alloc::string::String;

use crate::core::kernel::Espos;
use crate::core::registry::handle_type;
use crate::error::{EsposError, EsposResult};
use crate::port::Kernel;
use crate::types::{QueuePos, RecvMode, SendMode, Tick};

handle_type!(
    /// Message queue handle
    QueueHandle
);

pub(crate) struct QueueRecord<K: Kernel> {
    raw: K::Queue,
    msg_size: usize,
    capacity: usize,
    name: String,
}

impl<K: Kernel> Clone for QueueRecord<K> {
    fn clone(&self) -> Self {
        QueueRecord {
            raw: self.raw.clone(),
            msg_size: self.msg_size,
            capacity: self.capacity,
            name: self.name.clone(),
        }
    }
}

impl<K: Kernel> Espos<K> {
    /// Create a queue of `capacity` messages of `msg_size` bytes each
    pub fn queue_create(&self, msg_size: usize, capacity: usize) -> EsposResult<QueueHandle> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        if msg_size == 0 || capacity == 0 {
            return Err(EsposError::InvalidArgument);
        }

        let raw = self
            .kernel
            .queue_create(msg_size, capacity)
            .ok_or(EsposError::OutOfMemory)?;
        let record = QueueRecord {
            raw: raw.clone(),
            msg_size,
            capacity,
            name: String::new(),
        };
        match self.queues.insert(record) {
            Ok(handle) => {
                crate::trace!(
                    "espos: queue {} created, {} x {} bytes",
                    handle.get(),
                    capacity,
                    msg_size
                );
                Ok(QueueHandle(handle))
            }
            Err(e) => {
                self.kernel.queue_delete(&raw);
                Err(e)
            }
        }
    }

    /// Send a message
    ///
    /// # Arguments
    /// * `msg` - Exactly the queue's message size
    /// * `wait` - Ticks to wait for space; ignored from interrupt handlers
    /// * `pos` - Back for FIFO order, front for an urgent message
    /// * `mode` - [`SendMode::Overwrite`] never waits; when full it drops the
    ///   message at the opposite end of `pos`
    ///
    /// # Returns
    /// * `Err(EsposError::Timeout)` - Still full after `wait`
    pub fn queue_send(
        &self,
        queue: QueueHandle,
        msg: &[u8],
        wait: Tick,
        pos: QueuePos,
        mode: SendMode,
    ) -> EsposResult<()> {
        let (raw, msg_size) = self.queue_raw(queue)?;
        if msg.len() != msg_size {
            return Err(EsposError::InvalidArgument);
        }

        self.dispatch(
            |woken| {
                if self.kernel.queue_send_from_isr(&raw, msg, pos, mode, woken) {
                    Ok(())
                } else {
                    Err(EsposError::Timeout)
                }
            },
            || {
                if self.kernel.queue_send(&raw, msg, wait, pos, mode) {
                    Ok(())
                } else {
                    Err(EsposError::Timeout)
                }
            },
        )
    }

    /// Receive the next message into `out`
    #[inline]
    pub fn queue_recv(&self, queue: QueueHandle, out: &mut [u8], wait: Tick) -> EsposResult<()> {
        self.queue_recv_generic(queue, out, wait, RecvMode::Normal)
    }

    /// Receive or peek the next message into `out`
    ///
    /// # Returns
    /// * `Err(EsposError::Timeout)` - Still empty after `wait`
    pub fn queue_recv_generic(
        &self,
        queue: QueueHandle,
        out: &mut [u8],
        wait: Tick,
        mode: RecvMode,
    ) -> EsposResult<()> {
        let (raw, msg_size) = self.queue_raw(queue)?;
        if out.len() != msg_size {
            return Err(EsposError::InvalidArgument);
        }

        // both closures need the buffer; only one of them runs
        let out = core::cell::RefCell::new(out);
        self.dispatch(
            |woken| {
                if self
                    .kernel
                    .queue_recv_from_isr(&raw, &mut out.borrow_mut(), mode, woken)
                {
                    Ok(())
                } else {
                    Err(EsposError::Timeout)
                }
            },
            || {
                if self.kernel.queue_recv(&raw, &mut out.borrow_mut(), wait, mode) {
                    Ok(())
                } else {
                    Err(EsposError::Timeout)
                }
            },
        )
    }

    /// Number of queued messages; zero for an invalid handle
    ///
    /// A snapshot; concurrent senders and receivers may change it at once.
    pub fn queue_msg_waiting(&self, queue: QueueHandle) -> usize {
        self.queue_raw(queue)
            .map(|(raw, _)| self.kernel.queue_waiting(&raw))
            .unwrap_or(0)
    }

    /// Capacity of a queue in messages
    pub fn queue_capacity(&self, queue: QueueHandle) -> EsposResult<usize> {
        self.queues
            .with(queue.0, |record| record.capacity)
            .ok_or(EsposError::InvalidArgument)
    }

    /// Discard all queued messages
    ///
    /// Receivers blocked on the queue are not woken; they keep waiting.
    pub fn queue_flush(&self, queue: QueueHandle) -> EsposResult<()> {
        let (raw, _) = self.queue_raw(queue)?;
        self.kernel.queue_reset(&raw);
        Ok(())
    }

    /// Label a queue
    pub fn queue_set_name(&self, queue: QueueHandle, name: &str) -> EsposResult<()> {
        self.queues
            .with(queue.0, |record| record.name = String::from(name))
            .ok_or(EsposError::InvalidArgument)
    }

    /// Label given by [`Espos::queue_set_name`], empty by default
    pub fn queue_get_name(&self, queue: QueueHandle) -> EsposResult<String> {
        self.queue_record(queue).map(|record| record.name)
    }

    /// Delete a queue
    pub fn queue_del(&self, queue: QueueHandle) -> EsposResult<()> {
        if self.in_isr() {
            return Err(EsposError::CalledFromIsr);
        }

        let record = self.queues.remove(queue.0).ok_or(EsposError::InvalidArgument)?;
        self.kernel.queue_delete(&record.raw);
        crate::trace!("espos: queue {} deleted", queue.as_raw());
        Ok(())
    }

    fn queue_record(&self, queue: QueueHandle) -> EsposResult<QueueRecord<K>> {
        self.queues.get(queue.0).ok_or(EsposError::InvalidArgument)
    }

    /// Kernel queue and message size, without cloning the name
    fn queue_raw(&self, queue: QueueHandle) -> EsposResult<(K::Queue, usize)> {
        self.queues
            .with(queue.0, |record| (record.raw.clone(), record.msg_size))
            .ok_or(EsposError::InvalidArgument)
    }
}
