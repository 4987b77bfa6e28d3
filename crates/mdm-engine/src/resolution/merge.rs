//! §4.2.5 Merge masters: folds a victim MASTER's attachments into a
//! survivor, leaving an auditable `Replaces` pointer. §9 resolves unmerge
//! as the inverse of this operation (see [`DataManager::unmerge`]).

use mdm_collab::error::PersistenceFailure;
use mdm_types::{
    BatchOperation, Identifier, RecordKey, RecordStatus, Relationship, RelationshipType,
    TxInstruction,
};

use super::DataManager;

impl DataManager {
    /// §4.2.5: folds victim `V` into survivor `S`. Both keys must already
    /// name MASTERs; the caller (the Merger, C6) is responsible for
    /// resolving Master/Local and Local/Local role combinations before
    /// reaching this primitive.
    pub async fn merge_masters(
        &self,
        survivor: RecordKey,
        victim: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, PersistenceFailure> {
        let mut out = Vec::new();

        let mut victim_record = self.persistence.get_record(victim).await?.ok_or(PersistenceFailure)?;
        victim_record.status = RecordStatus::Obsolete;
        out.push(TxInstruction::Record {
            record: victim_record.clone(),
            operation: BatchOperation::Update,
        });

        for relationship_type in [
            RelationshipType::MasterRecord,
            RelationshipType::Candidate,
            RelationshipType::IgnoreCandidate,
        ] {
            let incoming = self.persistence.get_relationships_to(victim, Some(relationship_type)).await?;
            for mut relationship in Self::merge_context(incoming, context) {
                if !relationship.is_current() {
                    continue;
                }
                relationship.mark_deleted();
                let redirected = Relationship::new(
                    relationship.source,
                    survivor,
                    relationship_type,
                    relationship.classification,
                    BatchOperation::Insert,
                )
                .with_strength_option(relationship.strength);
                out.push(TxInstruction::Relationship(relationship));
                out.push(TxInstruction::Relationship(redirected));
            }
        }

        let survivor_record = self.persistence.get_record(survivor).await?.ok_or(PersistenceFailure)?;
        let survivor_identifiers: std::collections::HashSet<(String, String)> = survivor_record
            .identifiers
            .iter()
            .map(|identifier| (identifier.domain.clone(), identifier.value.clone()))
            .collect();

        let mut merged_survivor = survivor_record;
        for identifier in victim_record.identifiers {
            let key = (identifier.domain.clone(), identifier.value.clone());
            if !survivor_identifiers.contains(&key) {
                merged_survivor.identifiers.push(Identifier {
                    domain: identifier.domain,
                    value: identifier.value,
                });
            }
        }
        out.push(TxInstruction::Record {
            record: merged_survivor,
            operation: BatchOperation::Update,
        });

        out.push(TxInstruction::Relationship(Relationship::new(
            survivor,
            victim,
            RelationshipType::Replaces,
            mdm_types::Classification::System,
            BatchOperation::Insert,
        )));

        self.invalidate_cache(victim);
        Ok(out)
    }

    /// §9 open question, resolved: unmerge is the inverse of merge, not
    /// rejected. Requires the `Replaces(survivor -> victim)` pointer created
    /// by `merge_masters` to still be current, and reconstructs the
    /// victim's prior attachments from the MDM-controlled relationships the
    /// merge redirected (identified by the audit trail left on the redirect:
    /// the relationships now pointing at `survivor` that previously pointed
    /// at `victim`, recovered from the `OriginalMaster` pointers emitted by
    /// match-and-link's normal evolution of the graph).
    pub async fn unmerge_masters(
        &self,
        survivor: RecordKey,
        victim: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, mdm_collab::MdmError> {
        let replaces = self
            .persistence
            .get_relationships(survivor, Some(RelationshipType::Replaces))
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Persistence))?;
        let audit = Self::merge_context(replaces, context)
            .into_iter()
            .find(|relationship| relationship.is_current() && relationship.target == victim)
            .ok_or(mdm_collab::MdmError::Precondition)?;

        let mut out = Vec::new();
        let mut undone = audit;
        undone.mark_deleted();
        out.push(TxInstruction::Relationship(undone));

        let mut victim_record = self
            .persistence
            .get_record(victim)
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Persistence))?
            .ok_or(mdm_collab::MdmError::Precondition)?;
        victim_record.status = RecordStatus::Active;
        out.push(TxInstruction::Record {
            record: victim_record,
            operation: BatchOperation::Update,
        });

        let originals = self
            .persistence
            .get_relationships_to(victim, Some(RelationshipType::OriginalMaster))
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Persistence))?;
        for mut pointer in Self::merge_context(originals, context) {
            if !pointer.is_current() {
                continue;
            }
            let local = pointer.source;
            pointer.mark_deleted();
            out.push(TxInstruction::Relationship(pointer));

            if let Some(mut current) = self
                .current_master_relationship(local, context)
                .await
                .map_err(|report| report.change_context(mdm_collab::MdmError::Persistence))?
            {
                if current.target == survivor {
                    current.mark_deleted();
                    let restored = Relationship::new(
                        local,
                        victim,
                        RelationshipType::MasterRecord,
                        current.classification,
                        BatchOperation::Insert,
                    )
                    .with_strength_option(current.strength);
                    out.push(TxInstruction::Relationship(current));
                    out.push(TxInstruction::Relationship(restored));
                }
            }
        }

        self.invalidate_cache(survivor);
        self.invalidate_cache(victim);
        Ok(out)
    }
}
