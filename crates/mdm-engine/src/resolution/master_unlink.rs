//! §4.2.3 Master-unlink (`MdmTxMasterUnlink`): detaches a LOCAL from its
//! MASTER and suppresses it from re-joining via symmetric matching.

use mdm_collab::error::PersistenceFailure;
use mdm_types::{BatchOperation, Classification, RecordKey, Relationship, RelationshipType, TxInstruction};

use super::DataManager;

impl DataManager {
    /// Public entry point for §4.2.3: normalizes `a`/`b` so the master-side
    /// is first and runs [`Self::master_unlink`].
    pub async fn unlink(
        &self,
        a: RecordKey,
        b: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, mdm_collab::MdmError> {
        let (master, local) = self
            .normalize_master_unlink_args(a, b, context)
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Precondition))?;
        self.master_unlink(master, local, context)
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Persistence))
    }

    /// Normalizes `a`/`b` so the master-side is first, matching
    /// [`Self::normalize_master_link_args`]'s contract.
    pub(crate) async fn normalize_master_unlink_args(
        &self,
        a: RecordKey,
        b: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<(RecordKey, RecordKey), mdm_collab::error::PreconditionViolated> {
        let args = self.normalize_master_link_args(a, b, false, context).await?;
        Ok((args.master, args.local))
    }

    /// §4.2.3: marks `local`'s current `MasterRecord(local -> master)` as
    /// Delete, suppresses re-matching with an `IgnoreCandidate` back to
    /// `master` and to every other LOCAL currently on `master`, then
    /// reruns match-and-link on `local` carrying this context forward.
    pub(crate) async fn master_unlink(
        &self,
        master: RecordKey,
        local: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, PersistenceFailure> {
        let mut out = Vec::new();

        if let Some(mut relationship) = self.current_master_relationship(local, context).await? {
            relationship.mark_deleted();
            out.push(TxInstruction::Relationship(relationship));
        }

        out.push(TxInstruction::Relationship(Relationship::new(
            local,
            master,
            RelationshipType::IgnoreCandidate,
            Classification::Verified,
            BatchOperation::Insert,
        )));

        for sibling in self.current_locals_of(master, context).await? {
            if sibling == local {
                continue;
            }
            out.push(TxInstruction::Relationship(Relationship::new(
                local,
                sibling,
                RelationshipType::IgnoreCandidate,
                Classification::Verified,
                BatchOperation::Insert,
            )));
        }

        self.invalidate_cache(local);

        let mut rerun_context = context.to_vec();
        rerun_context.extend(out.iter().cloned());

        let mut record = self
            .persistence
            .get_record(local)
            .await?
            .ok_or(PersistenceFailure)?;
        // Remove MasterRecord from L's in-memory copy so rematching does
        // not see a relationship it just deleted.
        record
            .relationships
            .retain(|relationship| relationship.relationship_type != RelationshipType::MasterRecord);

        let rematch = self
            .match_and_link(record, &rerun_context)
            .await
            .map_err(|report| report.change_context(PersistenceFailure))?;
        out.extend(rematch);

        Ok(out)
    }
}
