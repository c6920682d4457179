//! Bounded history of instantaneous speed samples.

use crate::stats::{max_f64, mean_f64, min_f64};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of instantaneous samples kept for the sparkline and statistics.
pub const SAMPLE_CAPACITY: usize = 120;

/// Fixed-capacity sequence that evicts the oldest element on overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append `item`, returning the evicted oldest element if full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Contents from oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(SAMPLE_CAPACITY)
    }
}

/// Minimum, mean and maximum of the buffered speeds in Mbps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeedStats {
    pub min_mbps: f64,
    pub avg_mbps: f64,
    pub max_mbps: f64,
}

impl RingBuffer<f64> {
    /// Statistics over the current contents; all zero when empty.
    pub fn speed_stats(&self) -> SpeedStats {
        let values = self.to_vec();

        SpeedStats {
            min_mbps: min_f64(&values).unwrap_or(0.0),
            avg_mbps: mean_f64(&values).unwrap_or(0.0),
            max_mbps: max_f64(&values).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_capacity() {
        let buffer: RingBuffer<f64> = RingBuffer::default();
        assert_eq!(buffer.capacity(), 120);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_push_121st_evicts_oldest() {
        let mut buffer = RingBuffer::with_capacity(SAMPLE_CAPACITY);
        for i in 0..120 {
            assert_eq!(buffer.push(i as f64), None);
        }
        assert_eq!(buffer.len(), 120);

        let evicted = buffer.push(120.0);
        assert_eq!(evicted, Some(0.0));
        assert_eq!(buffer.len(), 120);
        assert_eq!(buffer.iter().next().copied(), Some(1.0));
        assert_eq!(buffer.iter().last().copied(), Some(120.0));
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut buffer = RingBuffer::with_capacity(0);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.to_vec(), vec![2]);
    }

    #[test]
    fn test_speed_stats_empty() {
        let buffer: RingBuffer<f64> = RingBuffer::default();
        assert_eq!(buffer.speed_stats(), SpeedStats::default());
    }

    #[test]
    fn test_speed_stats_values() {
        let mut buffer = RingBuffer::default();
        for value in [10.0, 30.0, 20.0] {
            buffer.push(value);
        }

        let stats = buffer.speed_stats();
        assert_eq!(stats.min_mbps, 10.0);
        assert_eq!(stats.avg_mbps, 20.0);
        assert_eq!(stats.max_mbps, 30.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: the buffer never exceeds its capacity and keeps the
        /// newest elements in insertion order
        #[test]
        fn never_exceeds_capacity(
            values in prop::collection::vec(0.0f64..1000.0, 0..400)
        ) {
            let mut buffer = RingBuffer::with_capacity(SAMPLE_CAPACITY);
            for value in &values {
                buffer.push(*value);
                prop_assert!(buffer.len() <= SAMPLE_CAPACITY);
            }

            let skip = values.len().saturating_sub(SAMPLE_CAPACITY);
            prop_assert_eq!(buffer.to_vec(), values[skip..].to_vec());
        }

        /// Property: avg is the mean of the contents and min <= avg <= max
        #[test]
        fn stats_match_contents(
            values in prop::collection::vec(0.0f64..10_000.0, 1..300)
        ) {
            let mut buffer = RingBuffer::default();
            for value in &values {
                buffer.push(*value);
            }

            let contents = buffer.to_vec();
            let expected = contents.iter().sum::<f64>() / contents.len() as f64;
            let stats = buffer.speed_stats();

            prop_assert!((stats.avg_mbps - expected).abs() < 1e-9);
            prop_assert!(stats.min_mbps <= stats.avg_mbps + 1e-9);
            prop_assert!(stats.avg_mbps <= stats.max_mbps + 1e-9);
        }
    }
}
