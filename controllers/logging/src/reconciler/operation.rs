//! Operation type determination
//!
//! Derives which lifecycle operation a `Logging` is in from its annotations,
//! its deletion marker and the recorded `lastOperation`.

use crds::{LastOperationState, LastOperationType, Logging, OPERATION_MIGRATE, OPERATION_RESTORE};

/// Operation the next reconciliation of `logging` performs
///
/// An explicit migrate/restore request wins. Otherwise a deletion marker
/// means delete, a resource without history is being created, and a create,
/// migrate or restore that has not succeeded yet is resumed.
pub fn compute_operation_type(logging: &Logging) -> LastOperationType {
    match logging.operation_annotation() {
        Some(OPERATION_MIGRATE) => return LastOperationType::Migrate,
        Some(OPERATION_RESTORE) => return LastOperationType::Restore,
        _ => {}
    }
    if logging.metadata.deletion_timestamp.is_some() {
        return LastOperationType::Delete;
    }

    let Some(last) = logging.last_operation() else {
        return LastOperationType::Create;
    };
    match last.operation_type {
        LastOperationType::Create | LastOperationType::Migrate | LastOperationType::Restore
            if last.state != LastOperationState::Succeeded =>
        {
            last.operation_type
        }
        _ => LastOperationType::Reconcile,
    }
}

/// Whether the resource has been migrated away and must be left alone
///
/// Only a migrate or restore request touches a resource whose last operation
/// was a successful migration.
pub fn should_skip(logging: &Logging, operation: LastOperationType) -> bool {
    !matches!(operation, LastOperationType::Migrate | LastOperationType::Restore)
        && logging
            .last_operation()
            .is_some_and(|last| last.operation_type == LastOperationType::Migrate && last.succeeded())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn logging() -> Logging {
        create_test_logging("logging", "shoot--dev--foo", "shoot")
    }

    #[test]
    fn test_new_resource_is_created() {
        assert_eq!(compute_operation_type(&logging()), LastOperationType::Create);
    }

    #[test]
    fn test_annotation_wins() {
        let migrate = with_operation_annotation(deleting(logging()), "migrate");
        assert_eq!(compute_operation_type(&migrate), LastOperationType::Migrate);

        let restore = with_last_operation(
            with_operation_annotation(logging(), "restore"),
            LastOperationType::Reconcile,
            LastOperationState::Succeeded,
        );
        assert_eq!(compute_operation_type(&restore), LastOperationType::Restore);

        // Other values are ignored
        let other = with_operation_annotation(logging(), "reconcile");
        assert_eq!(compute_operation_type(&other), LastOperationType::Create);
    }

    #[test]
    fn test_deletion_marker() {
        let deleted = with_last_operation(
            deleting(logging()),
            LastOperationType::Reconcile,
            LastOperationState::Succeeded,
        );
        assert_eq!(compute_operation_type(&deleted), LastOperationType::Delete);
    }

    #[test]
    fn test_unfinished_operations_are_resumed() {
        for operation in [LastOperationType::Create, LastOperationType::Migrate, LastOperationType::Restore] {
            for state in [LastOperationState::Processing, LastOperationState::Error] {
                let l = with_last_operation(logging(), operation, state);
                assert_eq!(compute_operation_type(&l), operation, "{} {}", operation, state);
            }
            let done = with_last_operation(logging(), operation, LastOperationState::Succeeded);
            assert_eq!(compute_operation_type(&done), LastOperationType::Reconcile);
        }

        // A failed reconcile or delete is simply reconciled again
        let failed = with_last_operation(logging(), LastOperationType::Delete, LastOperationState::Error);
        assert_eq!(compute_operation_type(&failed), LastOperationType::Reconcile);
    }

    #[test]
    fn test_skip_after_successful_migration() {
        let migrated = with_last_operation(logging(), LastOperationType::Migrate, LastOperationState::Succeeded);
        assert!(should_skip(&migrated, LastOperationType::Reconcile));
        assert!(should_skip(&migrated, LastOperationType::Delete));
        assert!(!should_skip(&migrated, LastOperationType::Migrate));
        assert!(!should_skip(&migrated, LastOperationType::Restore));

        let migrating = with_last_operation(logging(), LastOperationType::Migrate, LastOperationState::Error);
        assert!(!should_skip(&migrating, LastOperationType::Migrate));
        assert!(!should_skip(&logging(), LastOperationType::Create));
    }
}
