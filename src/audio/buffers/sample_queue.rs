//! A thread-safe FIFO of decoded voice samples.
//!
//! The capture callback appends whole frames; the update loop drains exactly as
//! many samples as the engine's ring has room for. A drain never returns a
//! partial result.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::audio::frame::SampleFrame;
use crate::pipeline::Pushable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("requested {requested} samples but only {available} are queued")]
    InsufficientData { requested: usize, available: usize },
}

/// The jitter buffer between the voice source and the playback channel.
///
/// Samples are kept in arrival order. With a capacity set, a push that would
/// overflow it discards the oldest samples first; without one the queue grows
/// for as long as the producer outpaces the consumer.
#[derive(Clone)]
pub struct SampleQueue {
    queue: Arc<Mutex<VecDeque<f32>>>,
    capacity: Option<usize>,
    dropped: Arc<AtomicU64>,
}

impl SampleQueue {
    /// An unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let initial = capacity.unwrap_or(0);
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(initial))),
            capacity,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Appends `samples` at the tail.
    ///
    /// Returns how many old samples were discarded to respect the capacity.
    pub fn push_samples(&self, samples: &[f32]) -> usize {
        let mut queue = self.queue.lock().unwrap();
        queue.extend(samples.iter().copied());

        let Some(capacity) = self.capacity else {
            return 0;
        };
        let overflow = queue.len().saturating_sub(capacity);
        if overflow > 0 {
            queue.drain(..overflow);
            self.dropped.fetch_add(overflow as u64, Ordering::Relaxed);
            debug!(
                "SampleQueue: dropped {} oldest samples (capacity={})",
                overflow, capacity
            );
        }
        overflow
    }

    /// Removes and returns exactly `count` samples from the head.
    ///
    /// Fails without touching the queue if fewer than `count` are available.
    pub fn drain(&self, count: usize) -> Result<Vec<f32>, QueueError> {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() < count {
            return Err(QueueError::InsufficientData {
                requested: count,
                available: queue.len(),
            });
        }
        Ok(queue.drain(..count).collect())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Total samples discarded by the capacity limit since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Pushable<SampleFrame> for SampleQueue {
    fn push(&self, input: SampleFrame) {
        self.push_samples(input.data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_exact_count() {
        let queue = SampleQueue::new();
        queue.push_samples(&[0.1, 0.2, 0.3, 0.4]);

        assert_eq!(queue.drain(3).unwrap(), vec![0.1, 0.2, 0.3]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_insufficient_leaves_queue_untouched() {
        let queue = SampleQueue::new();
        queue.push_samples(&[0.1, 0.2]);

        let err = queue.drain(3).unwrap_err();
        assert_eq!(
            err,
            QueueError::InsufficientData {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain(2).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let queue = SampleQueue::new();
        let f1 = SampleFrame::mono(vec![1.0, 2.0]);
        let f2 = SampleFrame::mono(vec![3.0]);
        let f3 = SampleFrame::mono(vec![4.0, 5.0, 6.0]);

        queue.push(f1);
        queue.push(f2);
        queue.push(f3);

        assert_eq!(queue.drain(6).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_zero_on_empty_queue() {
        let queue = SampleQueue::new();
        assert_eq!(queue.drain(0).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_interleaved_push_and_drain_never_short() {
        let queue = SampleQueue::new();
        let mut next = 0.0f32;
        let mut expected = 0.0f32;

        for round in 0..50usize {
            let frame: Vec<f32> = (0..(round % 7 + 1))
                .map(|_| {
                    next += 1.0;
                    next
                })
                .collect();
            queue.push_samples(&frame);

            let want = round % 5;
            match queue.drain(want) {
                Ok(samples) => {
                    assert_eq!(samples.len(), want);
                    for s in samples {
                        expected += 1.0;
                        assert_eq!(s, expected);
                    }
                }
                Err(QueueError::InsufficientData { available, .. }) => {
                    assert!(available < want);
                }
            }
        }
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let queue = SampleQueue::with_capacity(Some(4));
        assert_eq!(queue.push_samples(&[1.0, 2.0, 3.0]), 0);
        assert_eq!(queue.push_samples(&[4.0, 5.0, 6.0]), 2);

        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.drain(4).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_concurrent_push_and_drain() {
        let queue = SampleQueue::new();
        let producer = queue.clone();

        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                producer.push_samples(&[i as f32]);
            }
        });

        let mut drained = Vec::new();
        while drained.len() < 1000 {
            if let Ok(samples) = queue.drain(1) {
                drained.extend(samples);
            }
        }
        handle.join().unwrap();

        let expected: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        assert_eq!(drained, expected);
    }
}
