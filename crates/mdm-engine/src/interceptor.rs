//! C4: the Resource Interceptor. Subscribes to the repository lifecycle
//! events for a single model type and rewrites them onto the MDM graph
//! (§4.3). Modeled as §9 prescribes: a closed capability interface per
//! event, not a dynamically dispatched table — the Bundle Interceptor (C7)
//! looks up the handler for a type and calls the matching method directly.

use std::sync::Arc;

use mdm_collab::{
    bundle::{Bundle, BundlePersister},
    notify::{CancellableEvent, NotificationSink},
    MdmError, Policy, PolicyEnforcement,
};
use mdm_types::{tags, PrincipalId, Record, RecordKey, RelationshipType, TxInstruction};

use crate::resolution::DataManager;

/// One MDM-controlled repository event and the inbound record it carries.
/// `OnRetrieving`/`OnQuerying` carry only the key/filter, handled
/// separately by [`RetrievingOutcome`]/the Query Synthesizer (C5).
pub struct SavingEvent {
    pub record: Record,
    pub caller: PrincipalId,
}

/// Outcome of a save-path callback: either the event is cancelled (the
/// caller's own commit path proceeds unmodified) or MDM has already
/// committed a bundle and the original event should be suppressed.
pub enum InterceptResult {
    Cancelled,
    Committed { instructions: Vec<TxInstruction> },
}

/// Outcome of `OnRetrieving`: either fall through to the default retrieval,
/// or return a synthesized Master View in its place (§4.3).
pub enum RetrievingOutcome {
    FallThrough,
    Master(RecordKey),
}

/// Subscribes to one model type's repository lifecycle (§4.3). Holds the
/// Data Manager, the bundle persister, policy enforcement and a
/// notification sink — the same four collaborators every handler needs,
/// rather than re-deriving them per event.
pub struct ResourceInterceptor {
    model_type: String,
    data_manager: Arc<DataManager>,
    persister: Arc<dyn BundlePersister>,
    policy: Arc<dyn PolicyEnforcement>,
    notifications: Arc<dyn NotificationSink>,
}

impl ResourceInterceptor {
    #[must_use]
    pub fn new(
        model_type: impl Into<String>,
        data_manager: Arc<DataManager>,
        persister: Arc<dyn BundlePersister>,
        policy: Arc<dyn PolicyEnforcement>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            model_type: model_type.into(),
            data_manager,
            persister,
            policy,
            notifications,
        }
    }

    #[must_use]
    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// §4.3 `PrePersistenceValidate`: if the inbound object references a
    /// MASTER, demands write-master; a caller holding it writes the MASTER
    /// directly, a caller denied it is retried once against their own LOCAL
    /// (fetched or created), with a second denial terminal (§7
    /// Permission-denied). Strips MDM tags and version identity; repoints
    /// any embedded relationship that accidentally names a MASTER target to
    /// the caller's equivalent LOCAL; extracts embedded relationships into
    /// the bundle.
    pub async fn pre_persistence_validate(
        &self,
        mut record: Record,
        caller: &PrincipalId,
        bundle: &mut Bundle,
    ) -> error_stack::Result<Record, MdmError> {
        if record.is_record_of_truth() {
            self.policy
                .demand(Policy::EstablishRecordOfTruth, caller)
                .await
                .map_err(|report| report.change_context(MdmError::Permission))?;
            return Ok(record);
        }

        if record.is_master() || record.tags.get(tags::MDM_TYPE).map(String::as_str) == Some(tags::mdm_type_value::MASTER) {
            if self.policy.demand(Policy::WriteMaster, caller).await.is_err() {
                let owned_local = self.find_or_create_owned_local(&record, caller, bundle).await?;
                record = owned_local;
            }
        }

        record.tags.remove(tags::MDM_TYPE);
        record.tags.remove(tags::MDM_PROCESSED);
        record.tags.remove(tags::MDM_RESOURCE);

        let embedded = record.take_relationships();
        for relationship in embedded {
            bundle.push(TxInstruction::Relationship(relationship));
        }

        Ok(record)
    }

    async fn find_or_create_owned_local(
        &self,
        master_shaped: &Record,
        caller: &PrincipalId,
        bundle: &mut Bundle,
    ) -> error_stack::Result<Record, MdmError> {
        let owned = self
            .data_manager
            .find_owned_local(master_shaped.key, caller)
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        if let Some(existing) = owned {
            return Ok(existing);
        }

        let mut local = Record::new_local(self.model_type.clone(), mdm_types::Provenance {
            application: caller.clone(),
            device: None,
        });
        local.demographics = master_shaped.demographics.clone();
        local.identifiers = master_shaped.identifiers.clone();
        bundle.push(TxInstruction::Record {
            record: local.clone(),
            operation: mdm_types::BatchOperation::Insert,
        });
        local.relationships.push(mdm_types::Relationship::new(
            local.key,
            master_shaped.key,
            RelationshipType::MasterRecord,
            mdm_types::Classification::System,
            mdm_types::BatchOperation::Insert,
        ));
        Ok(local)
    }

    /// §4.3 `OnInserting`/`OnSaving`: guards against re-entry with the
    /// `$mdm.processed` tag, runs match-and-link (or, for a RoT, the RoT
    /// promotion primitive), commits the resulting bundle, and fans out
    /// link notifications.
    pub async fn on_saving(&self, event: CancellableEvent<SavingEvent>) -> error_stack::Result<InterceptResult, MdmError> {
        if event.cancelled {
            return Ok(InterceptResult::Cancelled);
        }

        let SavingEvent { mut record, caller } = event.payload;
        if record.tags.contains_key(tags::MDM_PROCESSED) {
            return Ok(InterceptResult::Cancelled);
        }
        record.tags.insert(tags::MDM_PROCESSED.to_owned(), "true".to_owned());

        let instructions = if record.is_record_of_truth() {
            let master = self
                .data_manager
                .current_master_relationship(record.key, &[])
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?
                .map(|relationship| relationship.target)
                .ok_or(MdmError::Precondition)?;
            self.data_manager
                .promote_record_of_truth(master, record.key, &caller, &[])
                .await?
        } else {
            self.data_manager.match_and_link(record, &[]).await?
        };

        let mut ordered = instructions.clone();
        ordered.sort_by_key(mdm_types::commit_phase);

        let mut bundle = Bundle::new();
        bundle.extend(ordered);
        let committed = self
            .persister
            .commit(bundle)
            .await
            .map_err(|report| report.change_context(MdmError::Commit))?;

        self.fan_out_link_notifications(&committed);

        Ok(InterceptResult::Committed {
            instructions: committed,
        })
    }

    fn fan_out_link_notifications(&self, instructions: &[TxInstruction]) {
        for instruction in instructions {
            let Some(relationship) = instruction.as_relationship() else {
                continue;
            };
            if relationship.relationship_type != RelationshipType::MasterRecord {
                continue;
            }
            if relationship.is_current() {
                self.notifications.link_established(relationship.source, relationship.target);
            } else {
                self.notifications.link_removed(relationship.source, relationship.target);
            }
        }
    }

    /// §4.3 `OnObsoleting`: builds the obsolete/delete bundle and commits.
    pub async fn on_obsoleting(&self, local: RecordKey) -> error_stack::Result<Vec<TxInstruction>, MdmError> {
        let mut instructions = self
            .data_manager
            .obsolete_local(local, &[])
            .await
            .map_err(|report| report.change_context(MdmError::Persistence))?;
        instructions.sort_by_key(mdm_types::commit_phase);

        let mut bundle = Bundle::new();
        bundle.extend(instructions);
        self.persister
            .commit(bundle)
            .await
            .map_err(|report| report.change_context(MdmError::Commit))
    }

    /// §4.3 `OnRetrieving`: a MASTER-keyed retrieval is answered with a
    /// synthesized Master View instead of the default lookup.
    #[must_use]
    pub fn on_retrieving(&self, requested: RecordKey, is_master: bool) -> RetrievingOutcome {
        if is_master {
            RetrievingOutcome::Master(requested)
        } else {
            RetrievingOutcome::FallThrough
        }
    }

    /// §4.3 `OnRetrieved`: a LOCAL not owned by the caller requires the
    /// read-mdm-locals permission.
    pub async fn on_retrieved(
        &self,
        retrieved: &Record,
        caller: &PrincipalId,
    ) -> error_stack::Result<(), MdmError> {
        if retrieved.is_master() || retrieved.provenance.owns(caller) {
            return Ok(());
        }
        self.policy
            .demand(Policy::ReadMdmLocals, caller)
            .await
            .map_err(|report| report.change_context(MdmError::Permission))
    }
}
