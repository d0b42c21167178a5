//! Append-only slot storage backing each primitive collection.
//!
//! Slot indices are never reused: removing a value leaves a hole, so a stale
//! handle resolves to "missing" instead of to an unrelated newer value.

#[derive(Debug, Clone)]
pub(crate) struct Slots<T> {
    entries: Vec<Option<T>>,
    live: usize,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            live: 0,
        }
    }
}

impl<T> Slots<T> {
    /// Appends a value; `None` when the index space is exhausted.
    pub(crate) fn push(&mut self, value: T) -> Option<u32> {
        let index = u32::try_from(self.entries.len()).ok()?;
        self.entries.push(Some(value));
        self.live += 1;
        Some(index)
    }

    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(index as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.entries.get_mut(index as usize)?.as_mut()
    }

    pub(crate) fn take(&mut self, index: u32) -> Option<T> {
        let taken = self.entries.get_mut(index as usize)?.take();
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    /// Writes `value` into an already allocated slot, occupied or not.
    ///
    /// Returns `Err(value)` when the slot was never allocated.
    pub(crate) fn put(&mut self, index: u32, value: T) -> Result<Option<T>, T> {
        let Some(slot) = self.entries.get_mut(index as usize) else {
            return Err(value);
        };
        let previous = slot.replace(value);
        if previous.is_none() {
            self.live += 1;
        }
        Ok(previous)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index as u32, value)))
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::Slots;

    #[test]
    fn removed_slots_are_not_reused() {
        let mut slots = Slots::default();
        let a = slots.push("a").unwrap();
        assert_eq!(slots.take(a), Some("a"));
        let b = slots.push("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(slots.get(a), None);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn put_refills_allocated_slot_only() {
        let mut slots = Slots::default();
        let a = slots.push(1).unwrap();
        slots.take(a);
        assert_eq!(slots.put(a, 2), Ok(None));
        assert_eq!(slots.get(a), Some(&2));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.put(7, 3), Err(3));
    }
}
