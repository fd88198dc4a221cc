//! # Circular Lists
//!
//! The kernel keeps threads and modules on circular lists: following `next`
//! from any entry eventually comes back to it, and traversal starts at a
//! list head and stops when the head recurs.
//!
//! [`Ring`] stores such a list as an arena of entries linked by index, so
//! there are no reference cycles. [`walk`] performs the traversal over any
//! list that can answer "what comes after this entry", which is all the
//! command handlers need from a collaborator.

use std::iter::FusedIterator;
use std::ops::{Index, IndexMut};

/// Stable position of an entry in a [`Ring`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingIndex(usize);

impl RingIndex
{
    /// Raw arena slot
    #[must_use]
    pub const fn slot(self) -> usize
    {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Entry<T>
{
    value: T,
    next: RingIndex,
}

/// Arena-backed circular list preserving insertion order
///
/// ## Example
///
/// ```rust
/// use kdbg_core::ring::Ring;
///
/// let mut ring = Ring::new();
/// ring.push("idle");
/// ring.push("init");
/// let names: Vec<_> = ring.iter().map(|(_, name)| *name).collect();
/// assert_eq!(names, ["idle", "init"]);
/// ```
#[derive(Debug, Clone)]
pub struct Ring<T>
{
    entries: Vec<Entry<T>>,
    head: Option<RingIndex>,
    tail: Option<RingIndex>,
}

impl<T> Default for Ring<T>
{
    fn default() -> Self
    {
        Self {
            entries: Vec::new(),
            head: None,
            tail: None,
        }
    }
}

impl<T> Ring<T>
{
    /// Empty ring
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append after the current tail, closing the cycle back to the head.
    pub fn push(&mut self, value: T) -> RingIndex
    {
        let index = RingIndex(self.entries.len());
        let head = self.head.unwrap_or(index);
        self.entries.push(Entry { value, next: head });
        if let Some(tail) = self.tail {
            self.entries[tail.0].next = index;
        }
        self.head = Some(head);
        self.tail = Some(index);
        index
    }

    /// First entry, if any
    #[must_use]
    pub fn head(&self) -> Option<RingIndex>
    {
        self.head
    }

    /// Entry following `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` did not come from this ring.
    #[must_use]
    pub fn next(&self, index: RingIndex) -> RingIndex
    {
        self.entries[index.0].next
    }

    /// Borrow an entry
    #[must_use]
    pub fn get(&self, index: RingIndex) -> Option<&T>
    {
        self.entries.get(index.0).map(|entry| &entry.value)
    }

    /// Mutably borrow an entry
    pub fn get_mut(&mut self, index: RingIndex) -> Option<&mut T>
    {
        self.entries.get_mut(index.0).map(|entry| &mut entry.value)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// True when the ring has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Find the first entry matching `pred`, in traversal order.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<RingIndex>
    {
        self.iter().find(|(_, value)| pred(value)).map(|(index, _)| index)
    }

    /// Entries in traversal order, starting at the head
    pub fn iter(&self) -> impl Iterator<Item = (RingIndex, &T)> + '_
    {
        walk(self.head, |index| self.next(index)).map(move |index| (index, &self.entries[index.0].value))
    }
}

/// # Panics
///
/// Panics if `index` did not come from this ring.
impl<T> Index<RingIndex> for Ring<T>
{
    type Output = T;

    fn index(&self, index: RingIndex) -> &T
    {
        &self.entries[index.0].value
    }
}

impl<T> IndexMut<RingIndex> for Ring<T>
{
    fn index_mut(&mut self, index: RingIndex) -> &mut T
    {
        &mut self.entries[index.0].value
    }
}

/// Iterator over one lap of a circular list
#[derive(Debug, Clone)]
pub struct Walk<I, F>
{
    start: Option<I>,
    cursor: Option<I>,
    next: F,
}

/// Visit every entry once, starting at `head`, until `head` recurs.
///
/// An empty list (`head == None`) yields nothing.
pub fn walk<I, F>(head: Option<I>, next: F) -> Walk<I, F>
where
    I: Copy + PartialEq,
    F: FnMut(I) -> I,
{
    Walk {
        start: head,
        cursor: head,
        next,
    }
}

impl<I, F> Iterator for Walk<I, F>
where
    I: Copy + PartialEq,
    F: FnMut(I) -> I,
{
    type Item = I;

    fn next(&mut self) -> Option<I>
    {
        let current = self.cursor?;
        let following = (self.next)(current);
        self.cursor = if Some(following) == self.start { None } else { Some(following) };
        Some(current)
    }
}

impl<I, F> FusedIterator for Walk<I, F>
where
    I: Copy + PartialEq,
    F: FnMut(I) -> I,
{
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_empty_ring_walks_nothing()
    {
        let ring: Ring<u32> = Ring::new();
        assert!(ring.head().is_none());
        assert_eq!(ring.iter().count(), 0);
    }

    #[test]
    fn test_single_entry_points_to_itself()
    {
        let mut ring = Ring::new();
        let only = ring.push(7);
        assert_eq!(ring.next(only), only);
        assert_eq!(ring.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_push_closes_cycle()
    {
        let mut ring = Ring::new();
        let a = ring.push('a');
        let b = ring.push('b');
        let c = ring.push('c');
        assert_eq!(ring.next(a), b);
        assert_eq!(ring.next(b), c);
        assert_eq!(ring.next(c), a);
        assert_eq!(ring.find(|v| *v == 'b'), Some(b));
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_walk_from_arbitrary_start()
    {
        // 0 -> 2 -> 1 -> 0
        let next = |i: usize| [2, 0, 1][i];
        assert_eq!(walk(Some(2), next).collect::<Vec<_>>(), vec![2, 1, 0]);
    }
}
