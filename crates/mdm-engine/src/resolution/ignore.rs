//! §4.2.4 Ignore / Un-ignore: explicit suppression of future matching
//! between a LOCAL and a MASTER, and its inverse.

use mdm_collab::MdmError;
use mdm_types::{BatchOperation, Classification, RecordKey, Relationship, RelationshipType, TxInstruction};

use super::DataManager;

impl DataManager {
    /// §4.2.4 Ignore: normalizes so `host` is a master, deletes any current
    /// `Candidate(ignore -> host)`, and emits a verified `IgnoreCandidate`.
    /// Symmetric: any other LOCAL attached to `host` with a `Candidate`
    /// pointing at `ignore`'s master is converted the same way.
    pub async fn ignore(
        &self,
        host: RecordKey,
        ignore_key: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        let args = self
            .normalize_master_link_args(host, ignore_key, false, context)
            .await
            .map_err(|report| report.change_context(MdmError::Precondition))?;
        let host_master = args.master;
        let ignore_local = args.local;

        let mut out = Vec::new();
        out.extend(
            self.delete_candidate_and_emit_ignore(ignore_local, host_master, context)
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?,
        );

        let ignore_master = self
            .resolve_to_master(ignore_local, context)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            .unwrap_or(ignore_local);

        for sibling in self
            .current_locals_of(host_master, context)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
        {
            if sibling == ignore_local {
                continue;
            }
            let sibling_candidates = self
                .persistence
                .get_relationships(sibling, Some(RelationshipType::Candidate))
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?;
            for candidate in super::DataManager::merge_context(sibling_candidates, context) {
                if candidate.is_current() && candidate.target == ignore_master {
                    out.extend(
                        self.delete_candidate_and_emit_ignore(sibling, ignore_master, context)
                            .await
                            .map_err(|report| report.change_context(MdmError::Persistence))?,
                    );
                }
            }
        }

        Ok(out)
    }

    async fn delete_candidate_and_emit_ignore(
        &self,
        source: RecordKey,
        target: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, mdm_collab::error::PersistenceFailure> {
        let mut out = Vec::new();
        let candidates = self.persistence.get_relationships(source, Some(RelationshipType::Candidate)).await?;
        for mut candidate in Self::merge_context(candidates, context) {
            if candidate.is_current() && candidate.target == target {
                candidate.mark_deleted();
                out.push(TxInstruction::Relationship(candidate));
            }
        }
        out.push(TxInstruction::Relationship(Relationship::new(
            source,
            target,
            RelationshipType::IgnoreCandidate,
            Classification::Verified,
            BatchOperation::Insert,
        )));
        Ok(out)
    }

    /// §4.2.4 Un-ignore: deletes the `IgnoreCandidate(local -> master)` and
    /// reruns match-and-link on `local` so a matching candidate can be
    /// produced again.
    pub async fn unignore(
        &self,
        local: RecordKey,
        master: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        let mut out = Vec::new();
        let existing = self
            .persistence
            .get_relationships(local, Some(RelationshipType::IgnoreCandidate))
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        for mut relationship in Self::merge_context(existing, context) {
            if relationship.is_current() && relationship.target == master {
                relationship.mark_deleted();
                out.push(TxInstruction::Relationship(relationship));
            }
        }

        let record = self
            .persistence
            .get_record(local)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            .ok_or(MdmError::Precondition)?;

        let mut rerun_context = context.to_vec();
        rerun_context.extend(out.iter().cloned());
        out.extend(self.match_and_link(record, &rerun_context).await?);

        Ok(out)
    }
}
