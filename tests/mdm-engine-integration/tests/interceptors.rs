//! Coverage for the Resource Interceptor (C4) and the Bundle Interceptor
//! (C7): the repository-lifecycle rewriting and the write-master
//! permission/escalation path neither had a dedicated test for.

use std::sync::Arc;

use mdm_collab::{
    notify::{CancellableEvent, NullNotificationSink},
    BundlePersister, PersistenceService,
};
use mdm_engine::{
    BundleInterceptor, BundleItem, DataManager, InterceptResult, ResourceInterceptor, RetrievingOutcome, SavingEvent,
};
use mdm_memory::{
    AllowAllPolicy, DenyingPolicy, InMemoryBundlePersister, InMemoryMatchConfigurationService, InMemoryMatcher,
    InMemoryPersistenceService, InMemoryStore,
};
use mdm_types::{tags, BatchOperation, Identifier, PrincipalId, Provenance, Record, RecordClass};

const PATIENT: &str = "Patient";

fn provenance(caller: &str) -> Provenance {
    Provenance {
        application: PrincipalId::application(caller),
        device: None,
    }
}

fn interceptor(
    store: &Arc<InMemoryStore>,
    policy: Arc<dyn mdm_collab::PolicyEnforcement>,
) -> (ResourceInterceptor, Arc<InMemoryPersistenceService>) {
    let persistence = Arc::new(InMemoryPersistenceService::new(Arc::clone(store)));
    let persister = Arc::new(InMemoryBundlePersister::new(Arc::clone(store)));
    let matcher = Arc::new(InMemoryMatcher::new(Arc::clone(store)));
    let configurations = Arc::new(InMemoryMatchConfigurationService::with_identity_config(
        vec![PATIENT.to_owned()],
        true,
    ));

    let data_manager = Arc::new(DataManager::new(
        Arc::clone(&persistence) as Arc<dyn PersistenceService>,
        matcher,
        configurations,
        Arc::clone(&policy),
    ));

    let resource_interceptor = ResourceInterceptor::new(
        PATIENT,
        data_manager,
        persister as Arc<dyn BundlePersister>,
        policy,
        Arc::new(NullNotificationSink),
    );

    (resource_interceptor, persistence)
}

fn master_shaped_inbound(caller: &str) -> Record {
    let mut record = Record::new_master(provenance(caller));
    record.class = RecordClass::Domain(PATIENT.to_owned());
    record.tags.insert(tags::MDM_TYPE.to_owned(), tags::mdm_type_value::MASTER.to_owned());
    record.identifiers.push(Identifier {
        domain: "NHID".to_owned(),
        value: "12345".to_owned(),
    });
    record
}

#[tokio::test]
async fn pre_persistence_validate_redirects_a_master_shaped_write_without_write_master() {
    let store = InMemoryStore::new();
    let policy = Arc::new(DenyingPolicy::denying([mdm_collab::Policy::WriteMaster]));
    let (resource_interceptor, _persistence) = interceptor(&store, policy);

    let caller = PrincipalId::application("caller-without-write-master");
    let inbound = master_shaped_inbound("caller-without-write-master");
    let mut bundle = mdm_collab::Bundle::new();

    let rewritten = resource_interceptor
        .pre_persistence_validate(inbound.clone(), &caller, &mut bundle)
        .await
        .unwrap();

    assert!(!rewritten.is_master(), "a write-master denial must redirect onto an owned LOCAL");
    assert_eq!(rewritten.class, RecordClass::Domain(PATIENT.to_owned()));
    assert!(rewritten.provenance.owns(&caller));
    assert!(!bundle.is_empty(), "the new LOCAL's insert instruction lands in the bundle");
}

#[tokio::test]
async fn pre_persistence_validate_allows_a_direct_master_write_with_write_master() {
    let store = InMemoryStore::new();
    let policy = Arc::new(AllowAllPolicy);
    let (resource_interceptor, _persistence) = interceptor(&store, policy);

    let caller = PrincipalId::application("caller-with-write-master");
    let inbound = master_shaped_inbound("caller-with-write-master");

    let mut bundle = mdm_collab::Bundle::new();
    let result = resource_interceptor
        .pre_persistence_validate(inbound.clone(), &caller, &mut bundle)
        .await
        .unwrap();

    assert_eq!(result.key, inbound.key, "an authorized caller's MASTER-shaped write proceeds unredirected");
}

#[tokio::test]
async fn on_saving_is_idempotent_under_the_processed_tag_guard() {
    let store = InMemoryStore::new();
    let policy = Arc::new(AllowAllPolicy);
    let (resource_interceptor, persistence) = interceptor(&store, policy);

    let mut local = Record::new_local(PATIENT, provenance("saving-test"));
    local.identifiers.push(Identifier {
        domain: "NHID".to_owned(),
        value: "999".to_owned(),
    });
    persistence.insert_record(local.clone()).await.unwrap();

    let caller = PrincipalId::application("saving-test");
    let event = CancellableEvent::new(SavingEvent {
        record: local.clone(),
        caller: caller.clone(),
    });
    let outcome = resource_interceptor.on_saving(event).await.unwrap();
    let InterceptResult::Committed { instructions } = outcome else {
        panic!("the first save must commit a match-and-link bundle");
    };
    assert!(!instructions.is_empty());

    // Resubmitting the already-processed record must be a no-op.
    let mut reprocessed = local.clone();
    reprocessed.tags.insert(tags::MDM_PROCESSED.to_owned(), "true".to_owned());
    let repeat_event = CancellableEvent::new(SavingEvent {
        record: reprocessed,
        caller,
    });
    let repeat_outcome = resource_interceptor.on_saving(repeat_event).await.unwrap();
    assert!(matches!(repeat_outcome, InterceptResult::Cancelled));
}

#[tokio::test]
async fn on_retrieving_synthesizes_a_master_view_only_for_master_keys() {
    let store = InMemoryStore::new();
    let policy = Arc::new(AllowAllPolicy);
    let (resource_interceptor, _persistence) = interceptor(&store, policy);

    let key = mdm_types::RecordKey::new_generated();
    assert!(matches!(resource_interceptor.on_retrieving(key, true), RetrievingOutcome::Master(master) if master == key));
    assert!(matches!(resource_interceptor.on_retrieving(key, false), RetrievingOutcome::FallThrough));
}

#[tokio::test]
async fn on_retrieved_demands_read_mdm_locals_for_a_local_the_caller_does_not_own() {
    let store = InMemoryStore::new();
    let policy = Arc::new(DenyingPolicy::denying([mdm_collab::Policy::ReadMdmLocals]));
    let (resource_interceptor, _persistence) = interceptor(&store, policy);

    let owner = PrincipalId::application("owner");
    let stranger = PrincipalId::application("stranger");
    let local = Record::new_local(PATIENT, provenance("owner"));

    resource_interceptor.on_retrieved(&local, &owner).await.unwrap();
    let denied = resource_interceptor.on_retrieved(&local, &stranger).await;
    assert!(denied.is_err(), "a non-owner without read-mdm-locals must be denied");
}

#[tokio::test]
async fn bundle_interceptor_dispatches_registered_types_and_passes_through_the_rest() {
    let store = InMemoryStore::new();
    let policy: Arc<dyn mdm_collab::PolicyEnforcement> = Arc::new(AllowAllPolicy);
    let (resource_interceptor, persistence) = interceptor(&store, policy);
    let bundle_interceptor = BundleInterceptor::new(vec![resource_interceptor]);

    let mut patient_record = Record::new_local(PATIENT, provenance("bundle-test"));
    patient_record.identifiers.push(Identifier {
        domain: "NHID".to_owned(),
        value: "42".to_owned(),
    });
    persistence.insert_record(patient_record.clone()).await.unwrap();

    let unregistered_record = Record::new_local("Encounter", provenance("bundle-test"));

    let items = vec![
        BundleItem {
            record: patient_record,
            operation: BatchOperation::Insert,
            caller: PrincipalId::application("bundle-test"),
        },
        BundleItem {
            record: unregistered_record.clone(),
            operation: BatchOperation::Insert,
            caller: PrincipalId::application("bundle-test"),
        },
    ];

    let outcome = bundle_interceptor.dispatch(items).await.unwrap();
    assert!(!outcome.committed.is_empty(), "the Patient item is rewritten onto the MDM graph");
    assert_eq!(outcome.passthrough.instructions().len(), 1, "the unregistered type falls through untouched");
    assert_eq!(
        outcome.passthrough.instructions()[0].as_record().unwrap().key,
        unregistered_record.key
    );
}
