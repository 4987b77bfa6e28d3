//! §7 "Orphan-detected": surfaces a LOCAL with zero or many current
//! `MasterRecord` relationships as a diagnostic, not a failure.

use mdm_collab::{error::PersistenceFailure, FormalIssue};
use mdm_types::{RecordKey, RelationshipType, TxInstruction};

use super::DataManager;

impl DataManager {
    /// Counts `local`'s current `MasterRecord` relationships and reports an
    /// [`FormalIssue::OrphanDetected`] when the count is anything but
    /// exactly one (§7). Never fails the caller's operation — the result is
    /// empty on the happy path.
    pub async fn detect_formal_issues(
        &self,
        local: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<FormalIssue>, PersistenceFailure> {
        let storage = self
            .persistence
            .get_relationships(local, Some(RelationshipType::MasterRecord))
            .await?;
        let merged = Self::merge_context(storage, context);
        let current_master_count = merged
            .into_iter()
            .filter(|relationship| {
                relationship.is_current() && !matches!(relationship.batch_operation, mdm_types::BatchOperation::Delete)
            })
            .count();

        if current_master_count == 1 {
            Ok(Vec::new())
        } else {
            Ok(vec![FormalIssue::OrphanDetected {
                local,
                current_master_count,
            }])
        }
    }
}
