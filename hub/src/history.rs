use crate::model::DataPoint;
use std::collections::VecDeque;

/// Retention cap per field.
pub const HISTORY_CAPACITY: usize = 100;

/// Bounded FIFO of samples for one field. Insertion order is chronological
/// order; once the buffer is full, each push evicts the oldest sample.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    points: VecDeque<DataPoint>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, point: DataPoint) {
        self.points.push_back(point);
        while self.points.len() > HISTORY_CAPACITY {
            self.points.pop_front();
        }
    }

    /// Last `n` points, oldest first.
    pub fn recent(&self, n: usize) -> Vec<DataPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All retained points, oldest first.
    pub fn to_vec(&self) -> Vec<DataPoint> {
        self.points.iter().copied().collect()
    }

    /// Rebuild a buffer from stored points, keeping the most recent 100.
    pub fn from_points(points: Vec<DataPoint>) -> Self {
        let mut buffer = Self::new();
        for point in points {
            buffer.push(point);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(value: f64) -> DataPoint {
        DataPoint {
            value,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_recent_returns_chronological_order() {
        let mut buffer = HistoryBuffer::new();
        for i in 0..5 {
            buffer.push(point(i as f64));
        }

        let values: Vec<f64> = buffer.recent(3).iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_recent_clamps_to_length() {
        let mut buffer = HistoryBuffer::new();
        buffer.push(point(1.0));

        assert_eq!(buffer.recent(10).len(), 1);
        assert!(buffer.recent(0).is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut buffer = HistoryBuffer::new();
        for i in 0..105 {
            buffer.push(point(i as f64));
        }

        assert_eq!(buffer.len(), HISTORY_CAPACITY);
        let values: Vec<f64> = buffer.recent(HISTORY_CAPACITY).iter().map(|p| p.value).collect();
        assert_eq!(values[0], 5.0);
        assert_eq!(values[99], 104.0);
    }

    #[test]
    fn test_from_points_trims_overflow() {
        let points: Vec<DataPoint> = (0..150).map(|i| point(i as f64)).collect();
        let buffer = HistoryBuffer::from_points(points);

        assert_eq!(buffer.len(), HISTORY_CAPACITY);
        assert_eq!(buffer.recent(1)[0].value, 149.0);
    }
}
