//! Host message queues
//!
//! A ring of fixed-size slots in one preallocated buffer. Messages enter at
//! either end and always leave from the front.

use std::sync::{Arc, Condvar, Mutex};
use std::vec::Vec;

use super::{block_on, lock};
use crate::types::{QueuePos, RecvMode, SendMode, Tick};

struct Ring {
    buf: Vec<u8>,
    msg_size: usize,
    capacity: usize,
    head: usize,
    len: usize,
    senders: usize,
    receivers: usize,
}

impl Ring {
    fn slot(&mut self, index: usize) -> &mut [u8] {
        let start = (index % self.capacity) * self.msg_size;
        &mut self.buf[start..start + self.msg_size]
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    fn push(&mut self, msg: &[u8], pos: QueuePos) {
        let index = match pos {
            QueuePos::Back => self.head + self.len,
            QueuePos::Front => {
                self.head = (self.head + self.capacity - 1) % self.capacity;
                self.head
            }
        };
        self.slot(index).copy_from_slice(msg);
        self.len += 1;
    }

    /// Make room for a message entering at `pos`
    fn evict(&mut self, pos: QueuePos) {
        match pos {
            QueuePos::Back => self.head = (self.head + 1) % self.capacity,
            QueuePos::Front => {}
        }
        self.len -= 1;
    }

    fn front(&mut self, out: &mut [u8]) {
        let head = self.head;
        out.copy_from_slice(self.slot(head));
    }

    fn pop(&mut self, out: &mut [u8]) {
        self.front(out);
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
    }
}

struct QueueCtl {
    ring: Mutex<Ring>,
    not_empty: Condvar,
    not_full: Condvar,
}

/// Message queue of the host kernel
#[derive(Clone)]
pub struct HostQueue(Arc<QueueCtl>);

impl HostQueue {
    /// `None` if the buffer cannot be allocated
    pub(super) fn new(msg_size: usize, capacity: usize) -> Option<Self> {
        let bytes = msg_size.checked_mul(capacity)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).ok()?;
        buf.resize(bytes, 0);

        Some(HostQueue(Arc::new(QueueCtl {
            ring: Mutex::new(Ring {
                buf,
                msg_size,
                capacity,
                head: 0,
                len: 0,
                senders: 0,
                receivers: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })))
    }

    /// Returns whether a receiver was waiting, `None` if still full
    pub(super) fn send(
        &self,
        msg: &[u8],
        wait: Tick,
        pos: QueuePos,
        mode: SendMode,
    ) -> Option<bool> {
        let mut ring = lock(&self.0.ring);

        if mode == SendMode::Overwrite {
            if ring.is_full() {
                ring.evict(pos);
            }
        } else {
            let (waited, room) = block_on(
                &self.0.not_full,
                ring,
                wait,
                |ring| &mut ring.senders,
                |ring| ring.is_full(),
            );
            ring = waited;
            if !room {
                return None;
            }
        }

        ring.push(msg, pos);
        self.0.not_empty.notify_one();
        Some(ring.receivers > 0)
    }

    /// Returns whether a sender was waiting, `None` if still empty
    pub(super) fn recv(&self, out: &mut [u8], wait: Tick, mode: RecvMode) -> Option<bool> {
        let ring = lock(&self.0.ring);
        let (mut ring, ready) = block_on(
            &self.0.not_empty,
            ring,
            wait,
            |ring| &mut ring.receivers,
            |ring| ring.len == 0,
        );
        if !ready {
            return None;
        }

        match mode {
            RecvMode::Normal => {
                ring.pop(out);
                self.0.not_full.notify_one();
                Some(ring.senders > 0)
            }
            RecvMode::Peek => {
                ring.front(out);
                // the message is still there for the next receiver
                self.0.not_empty.notify_one();
                Some(false)
            }
        }
    }

    pub(super) fn waiting(&self) -> usize {
        lock(&self.0.ring).len
    }

    /// Drop every message; blocked receivers keep waiting
    pub(super) fn reset(&self) {
        let mut ring = lock(&self.0.ring);
        ring.head = 0;
        ring.len = 0;
        self.0.not_full.notify_all();
    }
}
