//! Observers attached to criterion evaluation.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::hit::Hit;

/// Receives every criterion evaluation of a [`super::CriteriaSet`].
pub trait CriterionObserver: std::fmt::Debug + Send + Sync {
    fn observe(&self, criterion: &str, value: f64, accepted: bool, hits: &[&Hit]);
}

/// Values recorded for one criterion.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordedValues {
    /// Evaluated values in evaluation order.
    pub values: Vec<f64>,
    /// Common truth track id of the evaluated hits, `-1` if they disagree
    /// or any hit is unlabelled.
    pub track_ids: Vec<i32>,
}

/// Records criterion values for offline study of cut efficiency.
#[derive(Debug, Default)]
pub struct CriterionValueRecorder {
    records: Mutex<BTreeMap<String, RecordedValues>>,
}

impl CriterionValueRecorder {
    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> BTreeMap<String, RecordedValues> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded values for one criterion name.
    pub fn values(&self, criterion: &str) -> Vec<f64> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(criterion)
            .map(|r| r.values.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn common_track_id(hits: &[&Hit]) -> i32 {
    let mut ids = hits.iter().map(|h| h.truth_track_id());
    match ids.next().flatten() {
        Some(first) if ids.all(|id| id == Some(first)) => first,
        _ => -1,
    }
}

impl CriterionObserver for CriterionValueRecorder {
    fn observe(&self, criterion: &str, value: f64, _accepted: bool, hits: &[&Hit]) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = records.entry(criterion.to_string()).or_default();
        entry.values.push(value);
        entry.track_ids.push(common_track_id(hits));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_id_is_common_truth_or_minus_one() {
        let a = Hit::new(0, 0, [0.0; 3]).with_truth(4);
        let b = Hit::new(1, 1, [0.0; 3]).with_truth(4);
        let c = Hit::new(2, 2, [0.0; 3]).with_truth(5);
        let d = Hit::new(3, 3, [0.0; 3]);
        assert_eq!(common_track_id(&[&a, &b]), 4);
        assert_eq!(common_track_id(&[&a, &c]), -1);
        assert_eq!(common_track_id(&[&a, &d]), -1);

        let recorder = CriterionValueRecorder::default();
        recorder.observe("x", 1.5, true, &[&a, &b]);
        recorder.observe("x", 2.5, false, &[&a, &c]);
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot["x"].values, vec![1.5, 2.5]);
        assert_eq!(snapshot["x"].track_ids, vec![4, -1]);
        recorder.clear();
        assert!(recorder.values("x").is_empty());
    }
}
