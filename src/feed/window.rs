use crate::feed::types::PricePoint;
use std::collections::VecDeque;

/// Bounded window of the most recent price points, oldest first.
///
/// Pushes are O(1) amortized; when a push would exceed capacity the oldest
/// point is evicted. Mutated only from the feed pipeline's event sequence.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: PricePoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Replaces the contents with the last `capacity` elements of `points`,
    /// order preserved. Used once at startup to seed from history.
    pub fn seed(&mut self, points: &[PricePoint]) {
        let start = points.len().saturating_sub(self.capacity);
        self.points.clear();
        self.points.extend(points[start..].iter().copied());
    }

    pub fn snapshot(&self) -> Vec<PricePoint> {
        self.points.iter().copied().collect()
    }

    pub fn last(&self) -> Option<PricePoint> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
