//! # Idle Pool
//!
//! Purpose: Keep released connections in insertion order so acquire and the
//! health checker can examine opposite ends of the same structure.
//!
//! The container holds no lock of its own; every call site already holds the
//! client's state mutex. Front = most recently released, back = least
//! recently released. Acquire pops the front for locality, the health checker
//! pops the back because staleness correlates with time since last use.

use std::collections::VecDeque;

pub(crate) struct IdlePool<T> {
    items: VecDeque<T>,
}

impl<T> IdlePool<T> {
    pub fn new() -> Self {
        IdlePool {
            items: VecDeque::new(),
        }
    }

    /// Inserts a released item as the most recently used.
    pub fn push_front(&mut self, item: T) {
        self.items.push_front(item);
    }

    /// Removes the most recently used item.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes the least recently used item.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Removes every item, front first.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_prefers_most_recent() {
        let mut pool = IdlePool::new();
        pool.push_front('a');
        pool.push_front('b');
        assert_eq!(pool.pop_front(), Some('b'));
        assert_eq!(pool.pop_front(), Some('a'));
        assert_eq!(pool.pop_front(), None);
    }

    #[test]
    fn health_check_prefers_oldest() {
        let mut pool = IdlePool::new();
        pool.push_front('a');
        pool.push_front('b');
        assert_eq!(pool.pop_back(), Some('a'));
        assert_eq!(pool.pop_back(), Some('b'));
        assert_eq!(pool.pop_back(), None);
    }

    #[test]
    fn drain_empties_in_order() {
        let mut pool = IdlePool::new();
        pool.push_front(1);
        pool.push_front(2);
        pool.push_front(3);
        assert_eq!(pool.drain(), vec![3, 2, 1]);
        assert_eq!(pool.len(), 0);
    }
}
