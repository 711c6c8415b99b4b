use std::time::Duration;

use crate::error::{LedgerError, LedgerResult};
use crate::flush::worker::GroupFlushOutcome;
use crate::types::CycleId;

/// Outcome of one group within a cycle.
#[derive(Debug, Clone)]
pub struct GroupReport {
    pub key: String,
    pub result: LedgerResult<GroupFlushOutcome>,
}

impl GroupReport {
    pub fn new(key: String, result: LedgerResult<GroupFlushOutcome>) -> Self {
        Self { key, result }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything a finished flush cycle did.
///
/// A cycle with failed groups still finishes; failures are collected here instead of
/// stopping the other workers.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub duration: Duration,
    pub groups: Vec<GroupReport>,
}

impl CycleReport {
    /// Number of groups the scan returned.
    pub fn scanned(&self) -> usize {
        self.groups.len()
    }

    pub fn merged(&self) -> usize {
        self.count(|outcome| matches!(outcome, GroupFlushOutcome::Merged { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|outcome| matches!(outcome, GroupFlushOutcome::Empty { .. }))
    }

    pub fn orphaned(&self) -> usize {
        self.count(|outcome| matches!(outcome, GroupFlushOutcome::Orphaned { .. }))
    }

    pub fn failed(&self) -> usize {
        self.groups.iter().filter(|group| !group.is_success()).count()
    }

    /// Returns `true` when every group was flushed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Folds the failures of all groups into one error, if any group failed.
    pub fn error(&self) -> Option<LedgerError> {
        let errors: Vec<LedgerError> = self
            .groups
            .iter()
            .filter_map(|group| group.result.as_ref().err().cloned())
            .collect();

        if errors.is_empty() {
            return None;
        }

        Some(LedgerError::from(errors))
    }

    /// Converts a partially failed cycle into an error.
    pub fn into_result(self) -> LedgerResult<Self> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Status label of the cycle in metrics.
    pub fn status(&self) -> &'static str {
        if self.is_success() {
            "completed"
        } else {
            "partial"
        }
    }

    fn count(&self, predicate: impl Fn(&GroupFlushOutcome) -> bool) -> usize {
        self.groups
            .iter()
            .filter(|group| group.result.as_ref().is_ok_and(&predicate))
            .count()
    }
}
