//! Aggregation of resolution outcomes for one batch
//!
//! A registry is single-use: it belongs to exactly one submission and is
//! replaced, never reset, when the user submits again. Aggregation is a sum
//! and a count, so the arrival order of outcomes does not matter.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinates::SkyPosition;
use crate::resolver::ResolutionOutcome;
use crate::target::Target;

/// Identity of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one resolution attempt: a row of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId {
    pub batch: BatchId,
    pub index: usize,
}

/// What [`TargetRegistry::record`] did with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Recorded,
    /// Same attempt already counted
    Duplicate,
    /// Attempt belongs to another batch
    Stale,
    /// Index beyond the expected batch size
    OutOfRange,
}

#[derive(Debug, Clone)]
pub struct TargetRegistry {
    batch: BatchId,
    expected: usize,
    received: HashSet<usize>,
    sum_ra: f64,
    sum_dec: f64,
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Registry for a batch of `expected` attempts
    pub fn new(expected: usize) -> Self {
        Self {
            batch: BatchId::new(),
            expected,
            received: HashSet::with_capacity(expected),
            sum_ra: 0.0,
            sum_dec: 0.0,
            targets: Vec::new(),
        }
    }

    /// Registry for a single-target flow
    pub fn single() -> Self {
        Self::new(1)
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch
    }

    /// Attempt id for row `index` of this batch
    pub fn attempt(&self, index: usize) -> AttemptId {
        AttemptId {
            batch: self.batch,
            index,
        }
    }

    pub fn record(&mut self, attempt: AttemptId, outcome: &ResolutionOutcome) -> RecordStatus {
        if attempt.batch != self.batch {
            return RecordStatus::Stale;
        }
        if attempt.index >= self.expected {
            return RecordStatus::OutOfRange;
        }
        if !self.received.insert(attempt.index) {
            tracing::debug!(batch = %self.batch, index = attempt.index, "Duplicate outcome ignored");
            return RecordStatus::Duplicate;
        }

        if let ResolutionOutcome::Success(target) = outcome {
            self.sum_ra += target.ra();
            self.sum_dec += target.dec();
            self.targets.push(target.clone());
        }
        RecordStatus::Recorded
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() == self.expected
    }

    /// Mean position of the successful targets, once the batch is complete
    ///
    /// `None` before completion and when nothing resolved.
    pub fn centroid(&self) -> Option<SkyPosition> {
        if !self.is_complete() || self.targets.is_empty() {
            return None;
        }
        let n = self.targets.len() as f64;
        SkyPosition::new(self.sum_ra / n, self.sum_dec / n).ok()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received.len()
    }

    pub fn success_count(&self) -> usize {
        self.targets.len()
    }

    pub fn failure_count(&self) -> usize {
        self.received.len() - self.targets.len()
    }

    /// Resolved targets in arrival order
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(ra: f64, dec: f64) -> ResolutionOutcome {
        ResolutionOutcome::Success(Target {
            name: format!("{ra},{dec}"),
            position: SkyPosition::new(ra, dec).unwrap(),
            color: "red".to_string(),
            z_order: 1,
        })
    }

    fn not_found() -> ResolutionOutcome {
        ResolutionOutcome::NotFound {
            label: "x".to_string(),
            reason: "not found".to_string(),
        }
    }

    #[test]
    fn test_centroid_excludes_failures() {
        let mut registry = TargetRegistry::new(3);
        registry.record(registry.attempt(0), &success(10.0, 20.0));
        registry.record(registry.attempt(1), &not_found());
        registry.record(registry.attempt(2), &success(30.0, 40.0));

        assert!(registry.is_complete());
        let centroid = registry.centroid().unwrap();
        assert!((centroid.ra - 20.0).abs() < 1e-12);
        assert!((centroid.dec - 30.0).abs() < 1e-12);
        assert_eq!(registry.failure_count(), 1);
    }

    #[test]
    fn test_completion_is_order_independent() {
        let outcomes = [success(1.0, 1.0), not_found(), success(3.0, 3.0)];
        for order in [[0, 1, 2], [2, 1, 0], [1, 2, 0], [2, 0, 1]] {
            let mut registry = TargetRegistry::new(3);
            for (step, &index) in order.iter().enumerate() {
                assert!(!registry.is_complete());
                assert_eq!(
                    registry.record(registry.attempt(index), &outcomes[index]),
                    RecordStatus::Recorded
                );
                assert_eq!(registry.received(), step + 1);
            }
            assert!(registry.is_complete());
            let centroid = registry.centroid().unwrap();
            assert!((centroid.ra - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_duplicates_are_not_double_counted() {
        let mut registry = TargetRegistry::new(2);
        let attempt = registry.attempt(0);
        assert_eq!(registry.record(attempt, &success(10.0, 10.0)), RecordStatus::Recorded);
        assert_eq!(registry.record(attempt, &success(10.0, 10.0)), RecordStatus::Duplicate);
        assert!(!registry.is_complete());
        assert_eq!(registry.success_count(), 1);
    }

    #[test]
    fn test_stale_and_out_of_range_attempts() {
        let mut registry = TargetRegistry::single();
        let other = TargetRegistry::single();
        assert_eq!(
            registry.record(other.attempt(0), &success(1.0, 1.0)),
            RecordStatus::Stale
        );
        assert_eq!(
            registry.record(registry.attempt(1), &success(1.0, 1.0)),
            RecordStatus::OutOfRange
        );
        assert_eq!(registry.received(), 0);
    }

    #[test]
    fn test_no_centroid_without_successes_or_before_completion() {
        let mut registry = TargetRegistry::new(2);
        registry.record(registry.attempt(0), &success(5.0, 5.0));
        assert_eq!(registry.centroid(), None);
        registry.record(registry.attempt(1), &not_found());
        assert!(registry.centroid().is_some());

        let mut failed = TargetRegistry::single();
        failed.record(failed.attempt(0), &not_found());
        assert!(failed.is_complete());
        assert_eq!(failed.centroid(), None);
    }
}
