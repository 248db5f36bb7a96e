//! Handle registry
//!
//! Every object the layer hands out lives in a slot table and is named by a
//! word-sized token packing the slot index with a generation counter. Freeing
//! a slot bumps its generation, so a handle to a deleted object can never
//! reach whatever reuses the slot.

use alloc::vec::Vec;
use core::cell::RefCell;
use core::num::NonZeroUsize;

use critical_section::Mutex;

use crate::error::{EsposError, EsposResult};

const INDEX_BITS: u32 = 16;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GEN_MAX: usize = usize::MAX >> INDEX_BITS;

/// Slot index plus generation, never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RawHandle(NonZeroUsize);

impl RawHandle {
    fn new(index: usize, gen: usize) -> Self {
        debug_assert!(index <= INDEX_MASK && gen != 0);
        // gen is never zero, so neither is the packed value
        RawHandle(NonZeroUsize::new((gen << INDEX_BITS) | index).unwrap_or(NonZeroUsize::MIN))
    }

    pub(crate) fn from_raw(raw: usize) -> Option<Self> {
        if raw >> INDEX_BITS == 0 {
            return None;
        }
        NonZeroUsize::new(raw).map(RawHandle)
    }

    #[inline(always)]
    pub(crate) fn get(self) -> usize {
        self.0.get()
    }

    #[inline(always)]
    fn index(self) -> usize {
        self.0.get() & INDEX_MASK
    }

    #[inline(always)]
    fn gen(self) -> usize {
        self.0.get() >> INDEX_BITS
    }
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) $crate::core::registry::RawHandle);

        impl $name {
            /// Raw word-sized token, never `OBJ_NONE`
            #[inline]
            pub fn as_raw(self) -> usize {
                self.0.get()
            }

            /// Rebuild a handle from a raw token
            ///
            /// Only validates the shape of the token; whether it still names
            /// a live object is checked by every operation.
            #[inline]
            pub fn from_raw(raw: usize) -> Option<Self> {
                $crate::core::registry::RawHandle::from_raw(raw).map($name)
            }
        }
    };
}

pub(crate) use handle_type;

enum SlotState<T> {
    Free,
    Reserved,
    Occupied(T),
}

struct Slot<T> {
    gen: usize,
    state: SlotState<T>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Slots<T> {
    #[cfg(test)]
    fn live(&self, handle: RawHandle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.gen == handle.gen())
    }

    fn live_mut(&mut self, handle: RawHandle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.gen == handle.gen())
    }

    fn reserve(&mut self) -> EsposResult<RawHandle> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.state = SlotState::Reserved;
            return Ok(RawHandle::new(index, slot.gen));
        }

        let index = self.slots.len();
        if index > INDEX_MASK {
            return Err(EsposError::OutOfMemory);
        }
        self.slots
            .try_reserve(1)
            .map_err(|_| EsposError::OutOfMemory)?;
        self.free
            .try_reserve(index + 1 - self.free.len())
            .map_err(|_| EsposError::OutOfMemory)?;
        self.slots.push(Slot { gen: 1, state: SlotState::Reserved });
        Ok(RawHandle::new(index, 1))
    }

    fn release(&mut self, handle: RawHandle) -> Option<T> {
        let slot = self.live_mut(handle)?;
        let old = core::mem::replace(&mut slot.state, SlotState::Free);
        if let SlotState::Free = old {
            return None;
        }
        slot.gen = if slot.gen == GEN_MAX { 1 } else { slot.gen + 1 };
        // capacity for every index was reserved when the slot was created
        self.free.push(handle.index());
        match old {
            SlotState::Occupied(value) => Some(value),
            _ => None,
        }
    }
}

/// Slot table for one object kind
pub(crate) struct Registry<T> {
    inner: Mutex<RefCell<Slots<T>>>,
}

impl<T> Registry<T> {
    pub(crate) const fn new() -> Self {
        Registry {
            inner: Mutex::new(RefCell::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
            })),
        }
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut Slots<T>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Claim a slot whose value is supplied later by [`Registry::fill`]
    pub(crate) fn reserve(&self) -> EsposResult<RawHandle> {
        self.with_slots(|slots| slots.reserve())
    }

    /// Store the value of a reserved slot
    ///
    /// Gives the value back if the reservation was released meanwhile.
    pub(crate) fn fill(&self, handle: RawHandle, value: T) -> Result<(), T> {
        self.with_slots(|slots| match slots.live_mut(handle) {
            Some(slot) if matches!(slot.state, SlotState::Reserved) => {
                slot.state = SlotState::Occupied(value);
                Ok(())
            }
            _ => Err(value),
        })
    }

    pub(crate) fn insert(&self, value: T) -> EsposResult<RawHandle> {
        self.with_slots(|slots| {
            let handle = slots.reserve()?;
            if let Some(slot) = slots.live_mut(handle) {
                slot.state = SlotState::Occupied(value);
            }
            Ok(handle)
        })
    }

    /// Free a slot, reserved or occupied, returning its value
    pub(crate) fn remove(&self, handle: RawHandle) -> Option<T> {
        self.with_slots(|slots| slots.release(handle))
    }

    pub(crate) fn with<R>(&self, handle: RawHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.with_slots(|slots| match slots.live_mut(handle) {
            Some(Slot { state: SlotState::Occupied(value), .. }) => Some(f(value)),
            _ => None,
        })
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, handle: RawHandle) -> bool {
        self.with_slots(|slots| {
            matches!(slots.live(handle), Some(Slot { state: SlotState::Occupied(_), .. }))
        })
    }

    /// Handle of the first occupied slot matching `pred`, or of `value`
    /// freshly inserted when none does
    pub(crate) fn find_or_insert(
        &self,
        pred: impl Fn(&T) -> bool,
        value: impl FnOnce() -> T,
    ) -> EsposResult<RawHandle> {
        self.with_slots(|slots| {
            let found = slots.slots.iter().enumerate().find_map(|(index, slot)| match &slot.state {
                SlotState::Occupied(v) if pred(v) => Some(RawHandle::new(index, slot.gen)),
                _ => None,
            });
            if let Some(handle) = found {
                return Ok(handle);
            }
            let handle = slots.reserve()?;
            if let Some(slot) = slots.live_mut(handle) {
                slot.state = SlotState::Occupied(value());
            }
            Ok(handle)
        })
    }

    /// Number of occupied slots
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.with_slots(|slots| {
            slots
                .slots
                .iter()
                .filter(|slot| matches!(slot.state, SlotState::Occupied(_)))
                .count()
        })
    }
}

impl<T: Clone> Registry<T> {
    pub(crate) fn get(&self, handle: RawHandle) -> Option<T> {
        self.with(handle, |value| value.clone())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_misses_reused_slot() {
        let reg: Registry<u32> = Registry::new();
        let a = reg.insert(7).unwrap();
        assert_eq!(reg.remove(a), Some(7));

        let b = reg.insert(9).unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(reg.get(a), None);
        assert_eq!(reg.get(b), Some(9));
        assert_eq!(reg.remove(a), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn fill_after_release_hands_value_back() {
        let reg: Registry<u32> = Registry::new();
        let h = reg.reserve().unwrap();
        assert!(!reg.contains(h));
        assert_eq!(reg.remove(h), None);
        assert_eq!(reg.fill(h, 3), Err(3));

        let h = reg.reserve().unwrap();
        assert_eq!(reg.fill(h, 4), Ok(()));
        assert!(reg.contains(h));
    }

    #[test]
    fn find_or_insert_reuses_match() {
        let reg: Registry<u32> = Registry::new();
        let a = reg.find_or_insert(|v| *v == 5, || 5).unwrap();
        let b = reg.find_or_insert(|v| *v == 5, || 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn raw_tokens_round_trip() {
        let reg: Registry<u32> = Registry::new();
        let h = reg.insert(1).unwrap();
        assert_eq!(RawHandle::from_raw(h.get()), Some(h));
        assert_eq!(RawHandle::from_raw(0), None);
        assert_eq!(RawHandle::from_raw(3), None);
    }
}
