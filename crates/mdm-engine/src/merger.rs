//! C6: the Merger. Wraps the Data Manager behind the public record-merging
//! API of §4.5, firing cancellable Merging/Merged (and Un-prefixed) events
//! before deciding which Data Manager primitive a role combination calls
//! for.

use std::sync::Arc;

use mdm_collab::{
    bundle::{Bundle, BundlePersister},
    notify::CancellableEvent,
    persistence::{Page, RecordFilter},
    MdmError, Policy, PolicyEnforcement,
};
use mdm_types::{PrincipalId, RecordKey, Relationship, RelationshipType, TxInstruction};

use crate::resolution::{dedup_relationships_by_target, DataManager};

/// The pair of keys a merge/unmerge/ignore/unignore call is asked to
/// reconcile, before role normalization.
#[derive(Debug, Clone, Copy)]
pub struct MergePair {
    pub a: RecordKey,
    pub b: RecordKey,
}

/// Parameters for [`Merger::reset`] (the `mdm-clear` operation endpoint,
/// §6): `global_reset` sweeps every active record sharing the named key's
/// class, clearing each the same way, rather than just the named key;
/// `links_only` preserves `IgnoreCandidate` suppressions while clearing
/// `MasterRecord`/`Candidate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetParams {
    pub global_reset: bool,
    pub links_only: bool,
}

/// Which role combination a merge/unmerge call resolves to (§4.5: "Merge
/// decides the survivor/victim role combination — Master/Master, Master/
/// Local, Local/Local — and invokes the appropriate Data Manager primitive
/// under a bundle transaction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleCombination {
    MasterMaster,
    MasterLocal,
    LocalLocal,
}

/// Wraps [`DataManager`] with the public merging surface of §4.5. Holds the
/// same bundle persister and policy collaborators a Resource Interceptor
/// does, since every public method here commits its own bundle rather than
/// returning raw instructions to a caller.
pub struct Merger {
    data_manager: Arc<DataManager>,
    persister: Arc<dyn BundlePersister>,
    policy: Arc<dyn PolicyEnforcement>,
}

impl Merger {
    #[must_use]
    pub fn new(
        data_manager: Arc<DataManager>,
        persister: Arc<dyn BundlePersister>,
        policy: Arc<dyn PolicyEnforcement>,
    ) -> Self {
        Self {
            data_manager,
            persister,
            policy,
        }
    }

    async fn demand_merge(&self, caller: &PrincipalId) -> error_stack::Result<(), MdmError> {
        self.policy
            .demand(Policy::Merge, caller)
            .await
            .map_err(|report| report.change_context(MdmError::Permission))
    }

    async fn commit(&self, instructions: Vec<TxInstruction>) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        let mut deduped = dedup_relationships_only(instructions);
        deduped.sort_by_key(mdm_types::commit_phase);
        let mut bundle = Bundle::new();
        bundle.extend(deduped);
        self.persister
            .commit(bundle)
            .await
            .map_err(|report| report.change_context(MdmError::Commit))
    }

    async fn role_combination(&self, pair: MergePair) -> error_stack::Result<RoleCombination, MdmError> {
        let a_master = self
            .data_manager
            .resolve_to_master(pair.a, &[])
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            == Some(pair.a);
        let b_master = self
            .data_manager
            .resolve_to_master(pair.b, &[])
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            == Some(pair.b);
        Ok(match (a_master, b_master) {
            (true, true) => RoleCombination::MasterMaster,
            (false, false) => RoleCombination::LocalLocal,
            _ => RoleCombination::MasterLocal,
        })
    }

    /// §4.5 `Merge`. Fires `MergingEvent` (cancellable), then resolves the
    /// survivor/victim role combination and invokes the matching primitive:
    /// Master/Master folds directly via `merge_masters`; Master/Local links
    /// the LOCAL onto the MASTER as a verified match; Local/Local resolves
    /// each side's current MASTER first, then folds those.
    pub async fn merge(
        &self,
        pair: MergePair,
        caller: &PrincipalId,
        event: &mut CancellableEvent<MergePair>,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        if event.cancelled {
            return Ok(Vec::new());
        }
        self.demand_merge(caller).await?;

        let instructions = match self.role_combination(pair).await? {
            RoleCombination::MasterMaster => self
                .data_manager
                .merge_masters(pair.a, pair.b, &[])
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?,
            RoleCombination::MasterLocal => {
                let (master, local) = if self
                    .data_manager
                    .resolve_to_master(pair.a, &[])
                    .await
                    .map_err(|report| report.change_context(MdmError::Persistence))?
                    == Some(pair.a)
                {
                    (pair.a, pair.b)
                } else {
                    (pair.b, pair.a)
                };
                self.data_manager.link(master, local, true, &[]).await?
            }
            RoleCombination::LocalLocal => {
                let master_a = self
                    .data_manager
                    .resolve_to_master(pair.a, &[])
                    .await
                    .map_err(|report| report.change_context(MdmError::Persistence))?
                    .ok_or(MdmError::Precondition)?;
                let master_b = self
                    .data_manager
                    .resolve_to_master(pair.b, &[])
                    .await
                    .map_err(|report| report.change_context(MdmError::Persistence))?
                    .ok_or(MdmError::Precondition)?;
                self.data_manager
                    .merge_masters(master_a, master_b, &[])
                    .await
                    .map_err(|report| report.change_context(MdmError::Persistence))?
            }
        };

        self.commit(instructions).await
    }

    /// §4.5 `Unmerge`. Fires `UnMergingEvent`, then requires both keys to
    /// already name MASTERs (unmerge only undoes a Master/Master merge).
    pub async fn unmerge(
        &self,
        pair: MergePair,
        caller: &PrincipalId,
        event: &mut CancellableEvent<MergePair>,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        if event.cancelled {
            return Ok(Vec::new());
        }
        self.demand_merge(caller).await?;
        let instructions = self.data_manager.unmerge_masters(pair.a, pair.b, &[]).await?;
        self.commit(instructions).await
    }

    /// §4.5 `Ignore`.
    pub async fn ignore(
        &self,
        pair: MergePair,
        caller: &PrincipalId,
        event: &mut CancellableEvent<MergePair>,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        if event.cancelled {
            return Ok(Vec::new());
        }
        self.demand_merge(caller).await?;
        let instructions = self.data_manager.ignore(pair.a, pair.b, &[]).await?;
        self.commit(instructions).await
    }

    /// §4.5 `UnIgnore`.
    pub async fn unignore(
        &self,
        local: RecordKey,
        master: RecordKey,
        caller: &PrincipalId,
        event: &mut CancellableEvent<MergePair>,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        if event.cancelled {
            return Ok(Vec::new());
        }
        self.demand_merge(caller).await?;
        let instructions = self.data_manager.unignore(local, master, &[]).await?;
        self.commit(instructions).await
    }

    /// §4.5 `GetMergeCandidates`: the current `Candidate` relationships out
    /// of `key`, read-only — no bundle, no commit.
    pub async fn get_merge_candidates(
        &self,
        key: RecordKey,
        caller: &PrincipalId,
    ) -> error_stack::Result<Vec<Relationship>, MdmError> {
        self.demand_merge(caller).await?;
        self.current_relationships(key, RelationshipType::Candidate).await
    }

    /// §4.5 `GetIgnored`: the current `IgnoreCandidate` relationships out of
    /// `key`, read-only.
    pub async fn get_ignored(
        &self,
        key: RecordKey,
        caller: &PrincipalId,
    ) -> error_stack::Result<Vec<Relationship>, MdmError> {
        self.demand_merge(caller).await?;
        self.current_relationships(key, RelationshipType::IgnoreCandidate).await
    }

    async fn current_relationships(
        &self,
        key: RecordKey,
        relationship_type: RelationshipType,
    ) -> error_stack::Result<Vec<Relationship>, MdmError> {
        let relationships = self
            .data_manager
            .persistence
            .get_relationships(key, Some(relationship_type))
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        Ok(relationships.into_iter().filter(Relationship::is_current).collect())
    }

    /// §4.5 `DetectGlobalMergeCandidates`: runs match-and-link for `local`
    /// without linking on Match — used by the Batch-Match job (C8) to
    /// surface Candidate rows across the whole corpus without auto-linking
    /// behind the caller's back. Reuses `match_and_link` directly since its
    /// Match-branch auto-link is itself gated on the active configuration's
    /// `$mdm.auto-link` tag (§4.2.1 step 6), not a property of this method.
    pub async fn detect_global_merge_candidates(
        &self,
        local: RecordKey,
        caller: &PrincipalId,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        self.demand_merge(caller).await?;
        let record = self
            .data_manager
            .persistence
            .get_record(local)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?
            .ok_or(MdmError::Precondition)?;
        let instructions = self.data_manager.match_and_link(record, &[]).await?;
        self.commit(instructions).await
    }

    /// §4.5 `Reset`/`ClearMergeCandidates`/`ClearIgnoreFlags` (`mdm-clear`,
    /// §6): tears down `MasterRecord`/`Candidate` relationships for `local`
    /// (and, with `links_only` unset, `IgnoreCandidate` suppressions too).
    /// With `global_reset` set this is `ClearGlobalMergeCandidates`/
    /// `ClearGlobalIgnoreFlags`: `local` only anchors which domain class to
    /// sweep, every other active record of that class is cleared the same
    /// way, paging through the corpus the way the Batch-Match job (C8) does.
    pub async fn reset(
        &self,
        local: RecordKey,
        params: ResetParams,
        caller: &PrincipalId,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        self.demand_merge(caller).await?;

        let mut out = self.reset_instructions(local, params).await?;

        if params.global_reset {
            let anchor = self
                .data_manager
                .persistence
                .get_record(local)
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?
                .ok_or(MdmError::Precondition)?;

            let mut offset = 0;
            loop {
                let filter = RecordFilter {
                    class: Some(anchor.class.clone()),
                    identifier_domain_value: None,
                    keys: None,
                    active_only: true,
                };
                let page = Page {
                    offset,
                    limit: GLOBAL_RESET_PAGE_SIZE,
                };
                let batch = self
                    .data_manager
                    .persistence
                    .query_records(&filter, page)
                    .await
                    .map_err(|report| report.change_context(MdmError::Persistence))?;
                if batch.is_empty() {
                    break;
                }

                for record in &batch {
                    if record.key == local {
                        continue;
                    }
                    out.extend(self.reset_instructions(record.key, params).await?);
                }

                offset += batch.len();
            }
        }

        self.commit(out).await
    }

    async fn reset_instructions(
        &self,
        local: RecordKey,
        params: ResetParams,
    ) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        let mut out = Vec::new();
        let types = if params.links_only {
            vec![RelationshipType::MasterRecord, RelationshipType::Candidate]
        } else {
            vec![
                RelationshipType::MasterRecord,
                RelationshipType::Candidate,
                RelationshipType::IgnoreCandidate,
            ]
        };

        for relationship_type in types {
            let existing = self
                .data_manager
                .persistence
                .get_relationships(local, Some(relationship_type))
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?;
            for mut relationship in existing {
                if relationship.is_current() {
                    relationship.mark_deleted();
                    out.push(TxInstruction::Relationship(relationship));
                }
            }
        }

        self.data_manager.invalidate_cache(local);
        Ok(out)
    }
}

/// Page size for the `global_reset` corpus sweep in [`Merger::reset`],
/// matching [`crate::config::BatchMatchConfig`]'s default.
const GLOBAL_RESET_PAGE_SIZE: usize = 100;

/// Narrows the shared dedup pass to the relationship instructions in a
/// mixed `Vec<TxInstruction>`, leaving record instructions untouched —
/// `Merger` commits often mix a handful of record updates with many
/// relationship rewrites, unlike the Data Manager's relationship-only
/// callers.
fn dedup_relationships_only(instructions: Vec<TxInstruction>) -> Vec<TxInstruction> {
    let mut records = Vec::new();
    let mut relationships = Vec::new();
    for instruction in instructions {
        match instruction {
            TxInstruction::Record { .. } => records.push(instruction),
            TxInstruction::Relationship(relationship) => relationships.push(relationship),
        }
    }
    let mut out: Vec<TxInstruction> = records;
    out.extend(
        dedup_relationships_by_target(relationships)
            .into_iter()
            .map(TxInstruction::Relationship),
    );
    out
}
