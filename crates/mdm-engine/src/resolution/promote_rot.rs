//! §4.2.7 Promote Record-of-Truth: designates a LOCAL as the curated,
//! authoritative version of its MASTER.

use mdm_collab::{MdmError, Policy};
use mdm_types::{
    BatchOperation, Classification, PrincipalId, RecordKey, RelationshipType, TxInstruction,
};

use super::DataManager;

impl DataManager {
    /// §4.2.7: requires edit-RoT permission (plus establish-RoT when `M`
    /// has no RoT yet), sets `local.determiner = RecordOfTruth`, ensures a
    /// current `MasterRecordOfTruth(master -> local)` and `MasterRecord(local
    /// -> master)`, strips every Candidate/Ignore/OriginalMaster/Replaces
    /// relationship from `local`, and clears its demographic inner keys so
    /// persistence treats them as fresh rows.
    pub async fn promote_record_of_truth(
        &self,
        master: RecordKey,
        local: RecordKey,
        caller: &PrincipalId,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        let existing_rot = self
            .persistence
            .get_relationships(master, Some(RelationshipType::MasterRecordOfTruth))
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        let has_rot = Self::merge_context(existing_rot.clone(), context)
            .into_iter()
            .any(|relationship| relationship.is_current());

        self.policy
            .demand(Policy::EditRecordOfTruth, caller)
            .await
            .map_err(|report| report.change_context(MdmError::Permission))?;
        if !has_rot {
            self.policy
                .demand(Policy::EstablishRecordOfTruth, caller)
                .await
                .map_err(|report| report.change_context(MdmError::Permission))?;
        }

        let mut out = Vec::new();

        let mut record = self
            .persistence
            .get_record(local)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            .ok_or(MdmError::Precondition)?;
        record.determiner = mdm_types::Determiner::RecordOfTruth;
        record.demographics.clear_inner_keys();
        out.push(TxInstruction::Record {
            record,
            operation: BatchOperation::Update,
        });

        if !has_rot {
            out.push(TxInstruction::Relationship(mdm_types::Relationship::new(
                master,
                local,
                RelationshipType::MasterRecordOfTruth,
                Classification::System,
                BatchOperation::Insert,
            )));
        } else {
            for mut stale in Self::merge_context(existing_rot, context) {
                if stale.is_current() && stale.target != local {
                    stale.mark_deleted();
                    out.push(TxInstruction::Relationship(stale));
                }
            }
            out.push(TxInstruction::Relationship(mdm_types::Relationship::new(
                master,
                local,
                RelationshipType::MasterRecordOfTruth,
                Classification::System,
                BatchOperation::Insert,
            )));
        }

        if self
            .current_master_relationship(local, context)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            .is_none()
        {
            out.push(TxInstruction::Relationship(mdm_types::Relationship::new(
                local,
                master,
                RelationshipType::MasterRecord,
                Classification::Verified,
                BatchOperation::Insert,
            )));
        }

        for relationship_type in [
            RelationshipType::Candidate,
            RelationshipType::IgnoreCandidate,
            RelationshipType::OriginalMaster,
            RelationshipType::Replaces,
        ] {
            let relationships = self
                .persistence
                .get_relationships(local, Some(relationship_type))
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?;
            for mut relationship in Self::merge_context(relationships, context) {
                if relationship.is_current() {
                    relationship.mark_deleted();
                    out.push(TxInstruction::Relationship(relationship));
                }
            }
        }

        self.invalidate_cache(local);
        Ok(out)
    }
}
