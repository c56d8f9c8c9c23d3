//! Slot arena with generation-checked handles.
//!
//! A freed slot is reused with a bumped generation, so a stale handle to a
//! closed port can never reach whatever was opened in its place.

use std::num::NonZeroU64;

/// Opaque identifier of an open port.
///
/// Packs the slot index (low 32 bits) and its generation (high 32 bits).
/// Generations start at 1, so a valid handle is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle(NonZeroU64);

impl PortHandle {
    fn new(index: u32, generation: u32) -> Option<Self> {
        NonZeroU64::new((u64::from(generation) << 32) | u64::from(index)).map(Self)
    }

    /// Rebuild a handle from its integer form; `0` is never a handle.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn as_raw(self) -> u64 {
        self.0.get()
    }

    fn index(self) -> usize {
        (self.0.get() & u64::from(u32::MAX)) as usize
    }

    fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

impl std::fmt::Display for PortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.index(), self.generation())
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`. `None` only if every 32-bit slot index is taken.
    pub fn insert(&mut self, value: T) -> Option<PortHandle> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return PortHandle::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        PortHandle::new(index, 1)
    }

    pub fn get(&self, handle: PortHandle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn remove(&mut self, handle: PortHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        // Skip 0 on wrap-around so handles stay non-zero.
        slot.generation = slot.generation.checked_add(1).unwrap_or(1);
        self.free.push(handle.index() as u32);
        Some(value)
    }

    /// Take every value out, invalidating all handles.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.checked_add(1).unwrap_or(1);
                self.free.push(index as u32);
                values.push(value);
            }
        }
        values
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_non_zero() {
        let mut arena = Arena::new();
        let handle = arena.insert("a").unwrap();
        assert_ne!(handle.as_raw(), 0);
        assert_eq!(PortHandle::from_raw(0), None);
        assert_eq!(PortHandle::from_raw(handle.as_raw()), Some(handle));
    }

    #[test]
    fn test_insert_get_remove() {
        let mut arena = Arena::new();
        let a = arena.insert(10).unwrap();
        let b = arena.insert(20).unwrap();
        assert_eq!(arena.get(a), Some(&10));
        assert_eq!(arena.get(b), Some(&20));
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), Some(10));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_handle_does_not_reach_reused_slot() {
        let mut arena = Arena::new();
        let old = arena.insert("first").unwrap();
        arena.remove(old);

        let new = arena.insert("second").unwrap();
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get(new), Some(&"second"));
    }

    #[test]
    fn test_drain_invalidates_everything() {
        let mut arena = Arena::new();
        let a = arena.insert(1).unwrap();
        let b = arena.insert(2).unwrap();
        let mut drained = arena.drain();
        drained.sort();
        assert_eq!(drained, vec![1, 2]);
        assert!(arena.is_empty());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), None);
    }

    #[test]
    fn test_unknown_handle() {
        let arena: Arena<u8> = Arena::new();
        let bogus = PortHandle::from_raw(0xDEAD_0000_0007).unwrap();
        assert_eq!(arena.get(bogus), None);
    }
}
