use std::collections::VecDeque;

/// Fixed-capacity ring buffer, newest element first.
///
/// Pushing into a full ring evicts the oldest element.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    deque: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryRing<T> {
    /// A zero capacity is bumped to one so that the ring always holds the
    /// latest element.
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        let capacity = cap.max(1);
        Self {
            deque: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, returning the evicted oldest element if any.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.deque.pop_back()
        } else {
            None
        };

        self.deque.push_front(item);

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn clear(&mut self) {
        self.deque.clear()
    }

    /// Newest element.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.deque.front()
    }

    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.deque.front_mut()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.deque.get(idx)
    }

    /// Newest to oldest.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ T> {
        self.deque.iter()
    }

    /// Oldest to newest.
    #[inline]
    pub fn asc_iter(&self) -> impl Iterator<Item = &'_ T> {
        self.deque.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut ring = HistoryRing::with_capacity(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.push(4), Some(1));

        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(ring.asc_iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.front(), Some(&4));
    }

    #[test]
    fn test_clone_keeps_capacity() {
        let mut ring = HistoryRing::with_capacity(2);
        ring.push(1);
        let mut copy = ring.clone();
        copy.push(2);
        assert_eq!(copy.push(3), Some(1));

        assert_eq!(ring.len(), 1);
        assert_eq!(format!("{ring:?}"), "HistoryRing { deque: [1], capacity: 2 }");
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut ring = HistoryRing::with_capacity(0);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.front(), Some(&"b"));
    }
}
