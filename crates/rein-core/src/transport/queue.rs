//! Bounded FIFO with drop-oldest overflow.
//!
//! std Mutex で VecDeque を守り、tokio の Notify で待機側を起こします。
//! ロックは await を跨がないので std の Mutex で十分です。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append at the tail. When full, the oldest item is dropped and returned.
    pub fn push(&self, item: T) -> Option<T> {
        let dropped = {
            let mut items = self.lock();
            let dropped = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            dropped
        };
        // Notify outside the lock
        self.notify.notify_one();
        dropped
    }

    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Wait up to `timeout` for an item.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.pop_until(Instant::now() + timeout).await
    }

    /// Wait until `deadline` for an item.
    pub async fn pop_until(&self, deadline: Instant) -> Option<T> {
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return self.try_pop(),
            }
        }
    }

    /// Remove everything, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    /// Discard everything. Returns how many items were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let n = items.len();
        items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn overflow_keeps_the_most_recent() {
        let queue = BoundedQueue::new(200);
        for i in 0..250 {
            queue.push(i);
        }
        let items = queue.drain();
        assert_eq!(items.len(), 200);
        assert_eq!(items.first(), Some(&50));
        assert_eq!(items.last(), Some(&249));
        assert!(queue.is_empty());
    }

    #[test]
    fn push_reports_the_dropped_item() {
        let queue = BoundedQueue::new(2);
        assert_eq!(queue.push('a'), None);
        assert_eq!(queue.push('b'), None);
        assert_eq!(queue.push('c'), Some('a'));
        assert_eq!(queue.drain(), vec!['b', 'c']);
    }

    #[test]
    fn clear_reports_count() {
        let queue = BoundedQueue::new(4);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn pop_timeout_returns_none_when_empty() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(1);
        let started = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(30)).await, None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn pop_timeout_wakes_on_push() {
        let queue = Arc::new(BoundedQueue::new(4));
        let producer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.push(7u32);
        });
        assert_eq!(queue.pop_timeout(Duration::from_secs(2)).await, Some(7));
    }
}
