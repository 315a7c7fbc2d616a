//! Fixed-capacity rolling history

/// Windows retained by the EKF tracker across all metrics.
pub const HISTORY_CAPACITY: usize = 100;

/// Append-only ring of the most recent records.
///
/// The write counter grows without bound; the slot it lands in is always the
/// counter modulo capacity, so a write can never fall outside the backing
/// storage. When full, each append overwrites the oldest record.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    written: u64,
}

impl<T> HistoryBuffer<T> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { slots: Vec::with_capacity(capacity), capacity, written: 0 }
    }

    /// Append a record, returning the one it evicted, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let slot = (self.written % self.capacity as u64) as usize;
        self.written += 1;
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[slot], item))
        }
    }

    /// Records oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.slots.len() < self.capacity {
            0
        } else {
            (self.written % self.capacity as u64) as usize
        };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total records ever appended.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Records overwritten so far.
    pub fn evicted(&self) -> u64 {
        self.written - self.slots.len() as u64
    }
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn keeps_insertion_order_below_capacity() {
        let mut history = HistoryBuffer::new(4);
        for i in 0..3 {
            assert_eq!(history.push(i), None);
        }
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(history.evicted(), 0);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut history = HistoryBuffer::new(3);
        for i in 0..3 {
            history.push(i);
        }
        assert_eq!(history.push(3), Some(0));
        assert_eq!(history.push(4), Some(1));
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), [2, 3, 4]);
    }

    #[test]
    fn one_hundred_fifty_writes_keep_the_latest_hundred() {
        let mut history = HistoryBuffer::default();
        for i in 0..150u32 {
            history.push(i);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.written(), 150);
        assert_eq!(history.evicted(), 50);
        let kept: Vec<u32> = history.iter().copied().collect();
        assert_eq!(kept, (50..150).collect::<Vec<_>>());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = HistoryBuffer::new(0);
        history.push('a');
        assert_eq!(history.push('b'), Some('a'));
        assert_eq!(history.capacity(), 1);
    }

    proptest! {
        #[test]
        fn retains_the_most_recent_records(
            capacity in 1usize..64,
            writes in 0usize..300,
        ) {
            let mut history = HistoryBuffer::new(capacity);
            for i in 0..writes {
                history.push(i);
            }
            prop_assert!(history.len() <= capacity);
            let expected: Vec<usize> = (writes.saturating_sub(capacity)..writes).collect();
            prop_assert_eq!(history.iter().copied().collect::<Vec<_>>(), expected);
        }
    }
}
