//! C3: the Data Manager. Owns every graph mutation described in §4.2; each
//! public method returns the ordered list of storage instructions for the
//! caller (the Resource Interceptor, the Bundle Interceptor, or the Merger)
//! to hand to a [`BundlePersister`](mdm_collab::BundlePersister).

mod dedup;
mod ignore;
mod master_link;
mod master_unlink;
mod match_link;
mod merge;
mod obsolete;
mod promote_rot;
mod validate;

pub use dedup::dedup_relationships_by_target;
pub use master_link::MasterLinkArgs;

use std::sync::Arc;

use mdm_collab::{error::PersistenceFailure, MatchConfigurationService, Matcher, PersistenceService, PolicyEnforcement};
use mdm_types::{Record, RecordKey, Relationship, RelationshipType, TxInstruction};

use crate::{cache::MasterLinkCache, config::EngineConfig, view::EntityMaster};

/// Owns all graph mutations (§2 C3). Generic collaborators are held behind
/// `Arc<dyn ...>` rather than type parameters: every collaborator here is a
/// swappable backend by construction (persistence engine, matcher, policy
/// service), so there is no monomorphization benefit to threading them as
/// generics through every one of the dozen-plus methods below — see
/// `DESIGN.md`.
pub struct DataManager {
    pub(crate) persistence: Arc<dyn PersistenceService>,
    pub(crate) matcher: Arc<dyn Matcher>,
    pub(crate) configurations: Arc<dyn MatchConfigurationService>,
    pub(crate) policy: Arc<dyn PolicyEnforcement>,
    pub(crate) cache: Option<Arc<dyn MasterLinkCache>>,
    pub(crate) config: EngineConfig,
}

impl DataManager {
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        matcher: Arc<dyn Matcher>,
        configurations: Arc<dyn MatchConfigurationService>,
        policy: Arc<dyn PolicyEnforcement>,
    ) -> Self {
        Self {
            persistence,
            matcher,
            configurations,
            policy,
            cache: None,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn MasterLinkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Overlays in-flight `context` relationships onto a storage snapshot:
    /// an entry already present in storage is replaced by its context
    /// counterpart (matched by relationship key), a context entry with no
    /// storage counterpart is appended. This is the "context first, then
    /// storage" lookup order used throughout §4.2.
    pub(crate) fn merge_context(storage: Vec<Relationship>, context: &[TxInstruction]) -> Vec<Relationship> {
        let mut merged = storage;
        for instruction in context {
            if let Some(relationship) = instruction.as_relationship() {
                if let Some(existing) = merged.iter_mut().find(|candidate| candidate.key == relationship.key) {
                    *existing = relationship.clone();
                } else {
                    merged.push(relationship.clone());
                }
            }
        }
        merged
    }

    /// The current (non-deleted, non-obsoleted) `MasterRecord` relationship
    /// for `local`, checking `context` before storage (§4.2.1 step 2).
    pub(crate) async fn current_master_relationship(
        &self,
        local: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Option<Relationship>, mdm_collab::error::PersistenceFailure> {
        let storage = self
            .persistence
            .get_relationships(local, Some(RelationshipType::MasterRecord))
            .await?;
        let merged = Self::merge_context(storage, context);
        Ok(merged
            .into_iter()
            .find(|relationship| relationship.is_current() && !matches!(relationship.batch_operation, mdm_types::BatchOperation::Delete)))
    }

    /// Every other LOCAL currently attached to `master` (§4.2.1's
    /// `rematchMaster` check, §4.2.3's symmetric ignore, §4.2.5's merge).
    pub(crate) async fn current_locals_of(
        &self,
        master: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<RecordKey>, mdm_collab::error::PersistenceFailure> {
        let storage = self
            .persistence
            .get_relationships_to(master, Some(RelationshipType::MasterRecord))
            .await?;
        let merged = Self::merge_context(storage, context);
        Ok(merged
            .into_iter()
            .filter(|relationship| relationship.is_current() && !matches!(relationship.batch_operation, mdm_types::BatchOperation::Delete))
            .map(|relationship| relationship.source)
            .collect())
    }

    pub(crate) fn invalidate_cache(&self, local: RecordKey) {
        if let Some(cache) = &self.cache {
            cache.invalidate(local);
        }
    }

    /// Resolves `key` to the MASTER it currently belongs to: `key` itself if
    /// it already names a MASTER, else the target of its current
    /// `MasterRecord` relationship (§4.2.1 step 6b: "for a matched LOCAL,
    /// resolve its MASTER").
    pub(crate) async fn resolve_to_master(
        &self,
        key: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Option<RecordKey>, PersistenceFailure> {
        let Some(record) = self.persistence.get_record(key).await? else {
            return Ok(None);
        };
        if record.is_master() {
            return Ok(Some(key));
        }
        Ok(self
            .current_master_relationship(key, context)
            .await
            .map_err(|report| report.change_context(PersistenceFailure))?
            .map(|relationship| relationship.target))
    }

    /// Builds the synthesized view of `master`: the MASTER record itself,
    /// every LOCAL currently attached to it, and its Record-of-Truth if one
    /// exists (§4.1, used by §4.2.1 step 7's re-match classification).
    pub(crate) async fn load_master_view(
        &self,
        master: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<EntityMaster, PersistenceFailure> {
        let master_record = self
            .persistence
            .get_record(master)
            .await?
            .ok_or(PersistenceFailure)?;

        let local_keys = self.current_locals_of(master, context).await?;
        let mut locals = Vec::with_capacity(local_keys.len());
        let mut record_of_truth = None;
        for local_key in local_keys {
            if let Some(local) = self.persistence.get_record(local_key).await? {
                if local.is_record_of_truth() {
                    record_of_truth = Some(local.clone());
                }
                locals.push(local);
            }
        }

        Ok(EntityMaster::new(master_record, locals, record_of_truth))
    }

    /// Creates a fresh, empty MASTER record carrying `provenance` (§4.2.1
    /// step 8, §4.2.1 step 7's eviction branch).
    pub(crate) fn new_master_record(provenance: mdm_types::Provenance) -> Record {
        Record::new_master(provenance)
    }

    /// §4.3 `PrePersistenceValidate`: the LOCAL of `master` already owned by
    /// `caller`, if one exists.
    pub(crate) async fn find_owned_local(
        &self,
        master: RecordKey,
        caller: &mdm_types::PrincipalId,
    ) -> error_stack::Result<Option<Record>, PersistenceFailure> {
        for local_key in self.current_locals_of(master, &[]).await? {
            if let Some(local) = self.persistence.get_record(local_key).await? {
                if local.provenance.owns(caller) {
                    return Ok(Some(local));
                }
            }
        }
        Ok(None)
    }
}
