use std::collections::HashMap;
use std::fmt;

use coachbase_core::storage::{StorageError, StorageErrorKind};

/// Storage operations that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Select,
    Begin,
    Insert,
    Update,
    Delete,
    Commit,
    Rollback,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageOp::Select => "select",
            StorageOp::Begin => "begin",
            StorageOp::Insert => "insert",
            StorageOp::Update => "update",
            StorageOp::Delete => "delete",
            StorageOp::Commit => "commit",
            StorageOp::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct ScheduledFault {
    op: StorageOp,
    table: Option<String>,
    kind: StorageErrorKind,
    remaining: u32,
}

/// Scheduled failures and per-operation call counters.
#[derive(Debug, Default)]
pub(super) struct FaultPlan {
    scheduled: Vec<ScheduledFault>,
    calls: HashMap<StorageOp, u32>,
}

impl FaultPlan {
    pub(super) fn schedule(
        &mut self,
        op: StorageOp,
        table: Option<String>,
        kind: StorageErrorKind,
        times: u32,
    ) {
        if times == 0 {
            return;
        }
        self.scheduled.push(ScheduledFault {
            op,
            table,
            kind,
            remaining: times,
        });
    }

    /// Counts the call and returns the scheduled failure for it, if any.
    pub(super) fn check(&mut self, op: StorageOp, table: Option<&str>) -> Result<(), StorageError> {
        *self.calls.entry(op).or_default() += 1;

        let position = self.scheduled.iter().position(|fault| {
            fault.op == op
                && match (&fault.table, table) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                }
        });

        let Some(position) = position else {
            return Ok(());
        };

        let fault = &mut self.scheduled[position];
        let kind = fault.kind;
        fault.remaining -= 1;
        if fault.remaining == 0 {
            self.scheduled.remove(position);
        }

        Err(StorageError::new(kind, format!("injected {} failure", op)))
    }

    pub(super) fn calls(&self, op: StorageOp) -> u32 {
        self.calls.get(&op).copied().unwrap_or(0)
    }

    pub(super) fn clear(&mut self) {
        self.scheduled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_fires_requested_number_of_times() {
        let mut plan = FaultPlan::default();
        plan.schedule(StorageOp::Insert, None, StorageErrorKind::Timeout, 2);

        assert!(plan.check(StorageOp::Insert, Some("focus_areas")).is_err());
        assert!(plan.check(StorageOp::Select, Some("focus_areas")).is_ok());
        assert!(plan.check(StorageOp::Insert, Some("focus_areas")).is_err());
        assert!(plan.check(StorageOp::Insert, Some("focus_areas")).is_ok());
        assert_eq!(plan.calls(StorageOp::Insert), 3);
    }

    #[test]
    fn test_fault_scoped_to_table() {
        let mut plan = FaultPlan::default();
        plan.schedule(
            StorageOp::Select,
            Some("challenges".to_string()),
            StorageErrorKind::Constraint,
            1,
        );

        assert!(plan.check(StorageOp::Select, Some("focus_areas")).is_ok());
        let err = plan.check(StorageOp::Select, Some("challenges")).unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Constraint);
        assert_eq!(err.message, "injected select failure");
    }

    #[test]
    fn test_zero_times_schedules_nothing() {
        let mut plan = FaultPlan::default();
        plan.schedule(StorageOp::Commit, None, StorageErrorKind::Timeout, 0);

        assert!(plan.check(StorageOp::Commit, None).is_ok());
    }
}
