//! §4.2.1 Match-and-link (`MdmTxMatchMasters`), the heart of the engine:
//! given a LOCAL and an in-flight transaction context, produces the
//! ordered instructions that attach it to a MASTER.

use std::collections::HashMap;

use mdm_collab::{
    error::PersistenceFailure,
    matcher::{MatchClassification, MatchResult},
    MdmError,
};
use mdm_types::{
    BatchOperation, Classification, Record, RecordKey, Relationship, RelationshipType, TxInstruction,
};

use super::{master_link::MasterLinkArgs, DataManager};

impl DataManager {
    /// §4.2.1, steps 1-9. `context` is the sequence of instructions already
    /// planned earlier in the same transaction; this method never mutates
    /// storage, it only returns what storage should become.
    pub async fn match_and_link(
        &self,
        mut local: Record,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        // Step 1.
        if local.is_record_of_truth() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();

        // Step 2.
        let existing = self
            .current_master_relationship(local.key, context)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        let mut current_master = existing.as_ref().map(|relationship| relationship.target);
        let mut rematch_master = false;
        if let Some(master) = current_master {
            let siblings = self
                .current_locals_of(master, context)
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?;
            rematch_master = siblings.iter().any(|&key| key != local.key);
        }

        // Step 3.
        for relationship in local.take_relationships() {
            out.push(TxInstruction::Relationship(relationship));
        }

        // Step 4: ignore set.
        let ignore_set = self
            .build_ignore_set(local.key, current_master, context)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;

        // Step 5: delete pre-existing open Candidates of L.
        let open_candidates = self
            .persistence
            .get_relationships(local.key, Some(RelationshipType::Candidate))
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        for mut candidate in open_candidates {
            if candidate.is_current() {
                candidate.mark_deleted();
                out.push(TxInstruction::Relationship(candidate));
            }
        }

        // Step 6.
        let model_type = match &local.class {
            mdm_types::RecordClass::Domain(class) => class.clone(),
            mdm_types::RecordClass::Master => String::new(),
        };
        let configurations = self
            .configurations
            .active_configurations(&model_type)
            .await
            .map_err(|report| report.change_context(MdmError::Matcher))?;

        for configuration in &configurations {
            let evaluation = match self
                .matcher
                .evaluate(&local, &configuration.id, &ignore_set)
                .await
            {
                Ok(results) => results,
                Err(report) => {
                    tracing::warn!(configuration = %configuration.id, error = ?report, "match configuration failed, continuing with next");
                    continue;
                }
            };

            let grouped = self
                .group_by_master(evaluation, context)
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?;

            let matches: Vec<_> = grouped
                .iter()
                .filter(|(_, result)| result.classification == MatchClassification::Match)
                .collect();
            let probables: Vec<_> = grouped
                .iter()
                .filter(|(_, result)| result.classification == MatchClassification::Probable)
                .collect();

            let auto_link = configuration.auto_link();
            if matches.len() == 1 && auto_link {
                let (&master_key, result) = matches[0];
                match current_master {
                    None => {
                        out.push(TxInstruction::Relationship(
                            Relationship::new(
                                local.key,
                                master_key,
                                RelationshipType::MasterRecord,
                                Classification::Automagic,
                                BatchOperation::Insert,
                            )
                            .with_strength(result.strength),
                        ));
                        current_master = Some(master_key);
                    }
                    Some(existing_master) if existing_master != master_key => {
                        if existing.as_ref().map(|relationship| relationship.classification)
                            == Some(Classification::Verified)
                        {
                            out.push(TxInstruction::Relationship(
                                Relationship::new(
                                    local.key,
                                    master_key,
                                    RelationshipType::Candidate,
                                    Classification::Automagic,
                                    BatchOperation::Insert,
                                )
                                .with_strength(result.strength),
                            ));
                            rematch_master = false;
                        } else {
                            let args = MasterLinkArgs {
                                master: master_key,
                                local: local.key,
                                verified: false,
                            };
                            let mut instructions = self
                                .master_link(&args, context)
                                .await
                                .map_err(|report| report.change_context(MdmError::Persistence))?;
                            for instruction in &mut instructions {
                                if let Some(relationship) = instruction.as_relationship_mut() {
                                    if relationship.relationship_type == RelationshipType::MasterRecord
                                        && relationship.classification == Classification::System
                                    {
                                        relationship.classification = Classification::Automagic;
                                    }
                                }
                            }
                            out.extend(instructions);
                            current_master = Some(master_key);
                        }
                    }
                    Some(_same) => {
                        rematch_master = false;
                    }
                }
            } else {
                for &(&master_key, result) in &matches {
                    if current_master != Some(master_key) {
                        out.push(TxInstruction::Relationship(
                            Relationship::new(
                                local.key,
                                master_key,
                                RelationshipType::Candidate,
                                Classification::Automagic,
                                BatchOperation::Insert,
                            )
                            .with_strength(result.strength),
                        ));
                    }
                }
            }

            for &(&master_key, result) in &probables {
                if current_master != Some(master_key) {
                    out.push(TxInstruction::Relationship(
                        Relationship::new(
                            local.key,
                            master_key,
                            RelationshipType::Candidate,
                            Classification::Automagic,
                            BatchOperation::Insert,
                        )
                        .with_strength(result.strength),
                    ));
                }
            }
        }

        // Step 7: rematch against the existing master when siblings exist.
        if rematch_master {
            if let Some(master) = current_master {
                if let Some(resolved) = self
                    .rematch_existing_master(&local, master, existing.as_ref(), &configurations, context)
                    .await
                    .map_err(|report| report.change_context(MdmError::Persistence))?
                {
                    out.extend(resolved.instructions);
                    current_master = resolved.new_master;
                }
            }
        }

        // Step 8: still no current master -> mint a fresh one.
        if current_master.is_none() {
            let master = Self::new_master_record(local.provenance.clone());
            out.push(TxInstruction::Record {
                record: master.clone(),
                operation: BatchOperation::Insert,
            });
            out.push(TxInstruction::Relationship(Relationship::new(
                local.key,
                master.key,
                RelationshipType::MasterRecord,
                Classification::System,
                BatchOperation::Insert,
            )));
        }

        // Step 9: dedup by target, relationships first.
        let (relationships, records): (Vec<_>, Vec<_>) =
            out.into_iter().partition(|instruction| instruction.as_relationship().is_some());
        let relationships = relationships
            .into_iter()
            .filter_map(|instruction| match instruction {
                TxInstruction::Relationship(relationship) => Some(relationship),
                TxInstruction::Record { .. } => None,
            })
            .collect();
        let deduped = super::dedup_relationships_by_target(relationships);

        let mut result: Vec<TxInstruction> = deduped.into_iter().map(TxInstruction::Relationship).collect();
        result.extend(records);

        self.invalidate_cache(local.key);
        Ok(result)
    }

    /// Step 4: the ignore set of MASTER keys L must not be re-candidated
    /// against.
    async fn build_ignore_set(
        &self,
        local: RecordKey,
        current_master: Option<RecordKey>,
        context: &[TxInstruction],
    ) -> error_stack::Result<std::collections::HashSet<RecordKey>, PersistenceFailure> {
        let mut ignore = std::collections::HashSet::new();

        let direct = self
            .persistence
            .get_relationships(local, Some(RelationshipType::IgnoreCandidate))
            .await?;
        for relationship in Self::merge_context(direct, context) {
            if relationship.is_current() {
                ignore.insert(relationship.target);
            }
        }

        if let Some(master) = current_master {
            for sibling in self.current_locals_of(master, context).await? {
                if sibling == local {
                    continue;
                }
                let sibling_relationships = self.persistence.get_relationships(sibling, None).await?;
                for relationship in Self::merge_context(sibling_relationships, context) {
                    if relationship.is_current()
                        && matches!(
                            relationship.relationship_type,
                            RelationshipType::Candidate | RelationshipType::IgnoreCandidate
                        )
                    {
                        ignore.insert(relationship.target);
                    }
                }
            }
        }

        for instruction in context {
            if let Some(relationship) = instruction.as_relationship() {
                if relationship.relationship_type == RelationshipType::IgnoreCandidate
                    && relationship.batch_operation == BatchOperation::Delete
                {
                    ignore.remove(&relationship.target);
                }
            }
        }

        Ok(ignore)
    }

    /// Step 6b: groups distinct candidates by resolved master key, keeping
    /// the strongest result per master.
    async fn group_by_master(
        &self,
        results: Vec<MatchResult>,
        context: &[TxInstruction],
    ) -> error_stack::Result<HashMap<RecordKey, MatchResult>, PersistenceFailure> {
        let mut grouped: HashMap<RecordKey, MatchResult> = HashMap::new();
        for result in results {
            if result.classification == MatchClassification::NonMatch {
                continue;
            }
            let Some(master_key) = self.resolve_to_master(result.target, context).await? else {
                continue;
            };
            let candidate = MatchResult { target: master_key, ..result };
            let replace = match grouped.get(&master_key) {
                Some(current) => candidate.strength.get() > current.strength.get(),
                None => true,
            };
            if replace {
                grouped.insert(master_key, candidate);
            }
        }
        Ok(grouped)
    }

    /// Step 7, broken out for readability: classifies `local` against its
    /// existing master's synthesized view using the best classification
    /// found across all active configurations, then applies the
    /// corresponding branch.
    async fn rematch_existing_master(
        &self,
        local: &Record,
        master: RecordKey,
        existing: Option<&Relationship>,
        configurations: &[mdm_collab::matcher::MatchConfiguration],
        context: &[TxInstruction],
    ) -> error_stack::Result<Option<RematchOutcome>, PersistenceFailure> {
        let view = self.load_master_view(master, context).await?;
        let synthesized = view.synthesize();

        let mut best: Option<(MatchClassification, mdm_types::Strength)> = None;
        for configuration in configurations {
            let Ok((classification, strength)) = self
                .matcher
                .classify_against(local, &synthesized, &configuration.id)
                .await
            else {
                continue;
            };
            let better = match best {
                None => true,
                Some((current, current_strength)) => {
                    classification_rank(classification) > classification_rank(current)
                        || (classification == current && strength.get() > current_strength.get())
                }
            };
            if better {
                best = Some((classification, strength));
            }
        }

        let Some((classification, strength)) = best else {
            return Ok(None);
        };

        let existing_verified = existing.is_some_and(|relationship| relationship.classification == Classification::Verified);

        let mut out = Vec::new();
        let mut new_master = Some(master);

        match classification {
            MatchClassification::Match => {}
            MatchClassification::Probable if existing_verified => {
                for local_on_master in view.locals() {
                    if local_on_master.key == local.key {
                        continue;
                    }
                    let is_verified = self
                        .current_master_relationship(local_on_master.key, context)
                        .await?
                        .is_some_and(|relationship| relationship.classification == Classification::Verified);
                    if is_verified {
                        continue;
                    }
                    let evicted = Record::new_master(local_on_master.provenance.clone());
                    out.push(TxInstruction::Record {
                        record: evicted.clone(),
                        operation: BatchOperation::Insert,
                    });
                    out.push(TxInstruction::Relationship(Relationship::new(
                        local_on_master.key,
                        evicted.key,
                        RelationshipType::MasterRecord,
                        Classification::System,
                        BatchOperation::Insert,
                    )));
                    out.push(TxInstruction::Relationship(Relationship::new(
                        local_on_master.key,
                        master,
                        RelationshipType::OriginalMaster,
                        Classification::System,
                        BatchOperation::Insert,
                    )));
                }
            }
            MatchClassification::Probable => {
                if let Some(mut relationship) = existing.cloned() {
                    relationship.mark_deleted();
                    out.push(TxInstruction::Relationship(relationship));
                }
                out.push(
                    TxInstruction::Relationship(
                        Relationship::new(
                            local.key,
                            master,
                            RelationshipType::Candidate,
                            Classification::Automagic,
                            BatchOperation::Insert,
                        )
                        .with_strength(strength),
                    ),
                );
                out.push(TxInstruction::Relationship(Relationship::new(
                    local.key,
                    master,
                    RelationshipType::OriginalMaster,
                    Classification::System,
                    BatchOperation::Insert,
                )));
                new_master = None;
            }
            MatchClassification::NonMatch => {
                if let Some(mut relationship) = existing.cloned() {
                    relationship.mark_deleted();
                    out.push(TxInstruction::Relationship(relationship));
                }
                out.push(TxInstruction::Relationship(Relationship::new(
                    local.key,
                    master,
                    RelationshipType::OriginalMaster,
                    Classification::System,
                    BatchOperation::Insert,
                )));
                new_master = None;
            }
        }

        Ok(Some(RematchOutcome {
            instructions: out,
            new_master,
        }))
    }
}

struct RematchOutcome {
    instructions: Vec<TxInstruction>,
    new_master: Option<RecordKey>,
}

const fn classification_rank(classification: MatchClassification) -> u8 {
    match classification {
        MatchClassification::NonMatch => 0,
        MatchClassification::Probable => 1,
        MatchClassification::Match => 2,
    }
}
