//! Concurrent delivery queue, one instance per event type.
//!
//! Multi-producer/multi-consumer. The producer side never blocks: unbounded
//! queues always accept, bounded queues drop the record and count the drop.
//! Consumers poll with [`try_pop`](EventQueue::try_pop) or wait a bounded
//! interval with [`pop_timeout`](EventQueue::pop_timeout); neither holds a
//! lock across the producer path.
//!
//! Ordering: each producer's pushes come out in its own submission order.
//! Interleaving across producers feeding the same queue is unspecified.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

pub struct EventQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    dropped: AtomicU64,
}

impl<T> EventQueue<T> {
    /// Queue without a capacity bound; `push` always accepts.
    pub fn unbounded() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue bounded to `cap` records; overflow drops the newest record.
    pub fn bounded(cap: usize) -> Self {
        let (tx, rx) = bounded(cap);
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Push a record. Never blocks the producer.
    pub fn push(&self, record: T) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // The receiver half lives in `self`, so the channel cannot be
            // disconnected while the queue is alive.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Non-blocking pop; `None` when the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Pop with a bounded wait; `None` if nothing arrived within `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Records dropped by overflowing a bounded queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_single_producer_fifo() {
        let queue = EventQueue::unbounded();
        for i in 0..100 {
            queue.push(i);
        }
        for i in 0..100 {
            assert_eq!(queue.try_pop(), Some(i));
        }
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_empty_try_pop_does_not_block() {
        let queue: EventQueue<u32> = EventQueue::unbounded();
        let start = Instant::now();
        for _ in 0..1000 {
            assert!(queue.try_pop().is_none());
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_timeout_bounded_wait() {
        let queue: EventQueue<u32> = EventQueue::unbounded();
        let start = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_none());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_pop_timeout_returns_pushed_record() {
        let queue = Arc::new(EventQueue::unbounded());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                queue.push(7u32);
            })
        };
        assert_eq!(queue.pop_timeout(Duration::from_secs(5)), Some(7));
        producer.join().unwrap();
    }

    #[test]
    fn test_per_producer_fifo_across_two_producers() {
        let queue = Arc::new(EventQueue::unbounded());
        const PER_PRODUCER: u64 = 1_000;

        let spawn_producer = |base: u64| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.push(base + i);
                }
            })
        };
        let a = spawn_producer(0);
        let b = spawn_producer(1_000_000);
        a.join().unwrap();
        b.join().unwrap();

        let mut last_a = None;
        let mut last_b = None;
        let mut total = 0;
        while let Some(value) = queue.try_pop() {
            total += 1;
            if value < 1_000_000 {
                assert!(last_a.is_none_or(|prev| value > prev), "producer A reordered");
                last_a = Some(value);
            } else {
                assert!(last_b.is_none_or(|prev| value > prev), "producer B reordered");
                last_b = Some(value);
            }
        }
        assert_eq!(total, 2 * PER_PRODUCER);
    }

    #[test]
    fn test_bounded_overflow_drops_and_counts() {
        let queue = EventQueue::bounded(2);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_multi_consumer_drains_everything_once() {
        let queue = Arc::new(EventQueue::unbounded());
        const TOTAL: usize = 10_000;
        for i in 0..TOTAL {
            queue.push(i);
        }

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(value) = queue.try_pop() {
                        seen.push(value);
                    }
                    seen
                })
            })
            .collect();

        let mut all: Vec<usize> = consumers
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..TOTAL).collect::<Vec<_>>());
    }
}
