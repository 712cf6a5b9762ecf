//! Circular singly-linked list with a tail pointer.
//!
//! Owners hold an `Option<Ring<T>>`: an empty list is `None`, a `Ring` always
//! holds at least one entry. `tail` is the most recently inserted entry and
//! `tail.next` is the oldest, so appending and reading both ends is O(1).
//! Entries live in a vector and link to each other by index.

#[derive(Clone)]
pub struct Ring<T> {
    entries: Vec<RingEntry<T>>,
    tail: usize,
}

#[derive(Clone)]
struct RingEntry<T> {
    value: T,
    next: usize,
}

impl<T> Ring<T> {
    pub fn new(first: T) -> Self {
        Self {
            entries: vec![RingEntry {
                value: first,
                next: 0,
            }],
            tail: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        let index = self.entries.len();
        let head = self.entries[self.tail].next;
        self.entries.push(RingEntry { value, next: head });
        self.entries[self.tail].next = index;
        self.tail = index;
    }

    /// Most recently inserted entry.
    pub fn last(&self) -> &T {
        &self.entries[self.tail].value
    }

    /// Oldest entry.
    pub fn first(&self) -> &T {
        &self.entries[self.entries[self.tail].next].value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Walks the ring once, oldest entry first.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            cursor: self.entries[self.tail].next,
            remaining: self.entries.len(),
        }
    }
}

pub struct Iter<'a, T> {
    ring: &'a Ring<T>,
    cursor: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = &self.ring.entries[self.cursor];
        self.cursor = entry.next;
        self.remaining -= 1;
        Some(&entry.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Appends to a possibly empty ring.
pub fn push<T>(ring: &mut Option<Ring<T>>, value: T) {
    match ring {
        Some(ring) => ring.push(value),
        None => *ring = Some(Ring::new(value)),
    }
}

/// Rebuilds the ring with the entries `keep` accepts, preserving order.
pub fn retain<T: Clone>(ring: &Option<Ring<T>>, mut keep: impl FnMut(&T) -> bool) -> Option<Ring<T>> {
    let mut kept = None;
    if let Some(ring) = ring {
        for value in ring.iter() {
            if keep(value) {
                push(&mut kept, value.clone());
            }
        }
    }
    kept
}

/// Iterates a possibly empty ring.
pub fn iter<T>(ring: &Option<Ring<T>>) -> impl Iterator<Item = &T> {
    ring.iter().flat_map(Ring::iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_oldest_first() {
        let mut ring = None;
        for value in 1..=4 {
            push(&mut ring, value);
        }
        assert_eq!(iter(&ring).copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let ring = ring.unwrap();
        assert_eq!(*ring.first(), 1);
        assert_eq!(*ring.last(), 4);
    }

    #[test]
    fn retain_preserves_order_and_can_empty_the_ring() {
        let mut ring = None;
        for value in 1..=5 {
            push(&mut ring, value);
        }
        let odd = retain(&ring, |value| value % 2 == 1);
        assert_eq!(iter(&odd).copied().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(retain(&odd, |_| false).is_none());
    }
}
