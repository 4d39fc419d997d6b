//! Bounded blocking queue of image indices (spec §3 "Queues", §9 "Bounded
//! blocking queues").
//!
//! Used for both `present_queue` and `acquire_queue`. Capacity is always
//! `N+1` so the shutdown sentinel [`SHUTDOWN`] can always be pushed even
//! when the queue already holds every slot index.

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

/// Sentinel value pushed onto a queue to unblock a waiter at shutdown.
pub const SHUTDOWN: u32 = u32::MAX;

/// A mutex+condvar ring buffer, fixed at `capacity` on construction.
#[derive(Debug)]
pub struct BoundedQueue {
    capacity: usize,
    state: Mutex<VecDeque<u32>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl BoundedQueue {
    /// Creates an empty queue of the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Pushes `value`, blocking if the queue is momentarily full.
    ///
    /// Since capacity is always `N+1` and at most `N` real slot indices
    /// are ever live at once, only the sentinel push can observe a full
    /// queue in practice, and only transiently.
    pub fn push(&self, value: u32) {
        let mut queue = self.state.lock().unwrap();
        while queue.len() >= self.capacity {
            queue = self.not_full.wait(queue).unwrap();
        }
        queue.push_back(value);
        self.not_empty.notify_one();
    }

    /// Pre-fills the queue with `0..count`, used for the fifo-mode
    /// acquire queue at construction (spec §4.5.1 step 6).
    pub fn fill_sequential(&self, count: u32) {
        let mut queue = self.state.lock().unwrap();
        for i in 0..count {
            queue.push_back(i);
        }
    }

    /// Blocks indefinitely until an item is available.
    pub fn pop_blocking(&self) -> u32 {
        let mut queue = self.state.lock().unwrap();
        loop {
            if let Some(value) = queue.pop_front() {
                self.not_full.notify_one();
                return value;
            }
            queue = self.not_empty.wait(queue).unwrap();
        }
    }

    /// Pops an item, waiting at most `timeout`. `None` means the timeout
    /// elapsed with nothing available.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<u32> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.state.lock().unwrap();
        loop {
            if let Some(value) = queue.pop_front() {
                self.not_full.notify_one();
                return Some(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, timeout_result) = self.not_empty.wait_timeout(queue, deadline - now).unwrap();
            queue = guard;
            if timeout_result.timed_out() && queue.is_empty() {
                return None;
            }
        }
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<u32> {
        let mut queue = self.state.lock().unwrap();
        let value = queue.pop_front();
        if value.is_some() {
            self.not_full.notify_one();
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = BoundedQueue::new(4);
        queue.push(0);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.pop_blocking(), 0);
        assert_eq!(queue.pop_blocking(), 1);
        assert_eq!(queue.pop_blocking(), 2);
    }

    #[test]
    fn capacity_is_n_plus_one_so_sentinel_always_fits() {
        let n = 3;
        let queue = BoundedQueue::new(n + 1);
        queue.fill_sequential(n as u32);
        // The queue is "full" of real slots, but the sentinel must still fit.
        queue.push(SHUTDOWN);
        assert_eq!(queue.pop_blocking(), 0);
        assert_eq!(queue.pop_blocking(), 1);
        assert_eq!(queue.pop_blocking(), 2);
        assert_eq!(queue.pop_blocking(), SHUTDOWN);
    }

    #[test]
    fn try_pop_on_empty_queue_is_none() {
        let queue: BoundedQueue = BoundedQueue::new(2);
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn pop_timeout_returns_none_when_nothing_arrives() {
        let queue = BoundedQueue::new(2);
        assert_eq!(queue.pop_timeout(Duration::from_millis(5)), None);
    }

    #[test]
    fn pop_timeout_returns_value_when_present() {
        let queue = BoundedQueue::new(2);
        queue.push(7);
        assert_eq!(queue.pop_timeout(Duration::from_millis(50)), Some(7));
    }
}
