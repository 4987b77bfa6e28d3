//! Coverage for the Batch-Match job's paging and cancellation behavior.

use std::sync::Arc;

use mdm_collab::{BundlePersister, PersistenceService};
use mdm_engine::{BatchMatchJob, DataManager, JobState, Merger};
use mdm_memory::{
    AllowAllPolicy, InMemoryBundlePersister, InMemoryMatchConfigurationService, InMemoryMatcher,
    InMemoryPersistenceService, InMemoryStore,
};
use mdm_types::{DemographicValue, Identifier, PrincipalId, Provenance, Record};

const PATIENT: &str = "Patient";

fn provenance() -> Provenance {
    Provenance {
        application: PrincipalId::application("batch-tests"),
        device: None,
    }
}

fn patient(identifier: (&str, &str), name: &str) -> Record {
    let mut record = Record::new_local(PATIENT, provenance());
    record.identifiers.push(Identifier {
        domain: identifier.0.to_owned(),
        value: identifier.1.to_owned(),
    });
    record.demographics.names.push(DemographicValue {
        key: None,
        value: name.to_owned(),
    });
    record
}

#[tokio::test]
async fn batch_job_pages_through_every_local_and_completes() {
    let store = InMemoryStore::new();
    let persistence = Arc::new(InMemoryPersistenceService::new(Arc::clone(&store)));
    let persister = Arc::new(InMemoryBundlePersister::new(Arc::clone(&store)));
    let matcher = Arc::new(InMemoryMatcher::new(Arc::clone(&store)));
    let configurations = Arc::new(InMemoryMatchConfigurationService::with_identity_config(
        vec![PATIENT.to_owned()],
        true,
    ));
    let policy = Arc::new(AllowAllPolicy);

    let data_manager = Arc::new(DataManager::new(
        Arc::clone(&persistence) as Arc<dyn PersistenceService>,
        matcher,
        configurations,
        policy.clone(),
    ));

    for index in 0..5 {
        let local = patient(("NHID", &index.to_string()), &format!("Patient {index}"));
        persistence.insert_record(local.clone()).await.unwrap();
        let instructions = data_manager.match_and_link(local, &[]).await.unwrap();
        let mut bundle = mdm_collab::Bundle::new();
        bundle.extend(instructions);
        persister.commit(bundle).await.unwrap();
    }

    let merger = Arc::new(Merger::new(
        Arc::clone(&data_manager),
        Arc::clone(&persister) as Arc<dyn BundlePersister>,
        policy,
    ));

    let mut config = mdm_engine::BatchMatchConfig::default();
    config.page_size = std::num::NonZeroUsize::new(2).unwrap();
    let job = BatchMatchJob::new(
        Arc::clone(&persistence) as Arc<dyn PersistenceService>,
        merger,
        config,
        PATIENT,
        5,
    );

    let caller = PrincipalId::application("batch-tests");
    let state = job.run(&caller, None).await.unwrap();
    assert_eq!(state, JobState::Completed);
    assert!((job.progress() - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn batch_job_aborts_between_pages_once_cancelled() {
    let store = InMemoryStore::new();
    let persistence = Arc::new(InMemoryPersistenceService::new(Arc::clone(&store)));
    let persister = Arc::new(InMemoryBundlePersister::new(Arc::clone(&store)));
    let matcher = Arc::new(InMemoryMatcher::new(Arc::clone(&store)));
    let configurations = Arc::new(InMemoryMatchConfigurationService::with_identity_config(
        vec![PATIENT.to_owned()],
        true,
    ));
    let policy = Arc::new(AllowAllPolicy);

    let data_manager = Arc::new(DataManager::new(
        Arc::clone(&persistence) as Arc<dyn PersistenceService>,
        matcher,
        configurations,
        policy.clone(),
    ));

    for index in 0..3 {
        let local = patient(("NHID", &index.to_string()), &format!("Patient {index}"));
        persistence.insert_record(local.clone()).await.unwrap();
        let instructions = data_manager.match_and_link(local, &[]).await.unwrap();
        let mut bundle = mdm_collab::Bundle::new();
        bundle.extend(instructions);
        persister.commit(bundle).await.unwrap();
    }

    let merger = Arc::new(Merger::new(
        Arc::clone(&data_manager),
        Arc::clone(&persister) as Arc<dyn BundlePersister>,
        policy,
    ));

    let config = mdm_engine::BatchMatchConfig::default();
    let job = Arc::new(BatchMatchJob::new(
        Arc::clone(&persistence) as Arc<dyn PersistenceService>,
        merger,
        config,
        PATIENT,
        3,
    ));
    job.cancel();

    let caller = PrincipalId::application("batch-tests");
    let state = job.run(&caller, None).await.unwrap();
    assert_eq!(state, JobState::Aborted);
}
