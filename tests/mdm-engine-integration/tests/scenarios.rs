//! The six end-to-end scenarios and the cross-cutting invariants, run
//! against the in-memory reference collaborators.

use std::sync::Arc;

use mdm_collab::{notify::CancellableEvent, BundlePersister, FormalIssue, Page, PersistenceService, RecordFilter};
use mdm_engine::{DataManager, EngineConfig, EntityMaster, MergePair, Merger, QuerySynthesizer, SynthesizedQuery, UnlinkMode};
use mdm_memory::{
    AllowAllPolicy, InMemoryBundlePersister, InMemoryMatchConfigurationService, InMemoryMatcher,
    InMemoryPersistenceService, InMemoryStore,
};
use mdm_types::{
    Classification, DemographicValue, Identifier, PrincipalId, Provenance, Record, RecordClass,
    RelationshipType, TxInstruction,
};

const PATIENT: &str = "Patient";

struct Harness {
    persistence: Arc<InMemoryPersistenceService>,
    persister: InMemoryBundlePersister,
    data_manager: Arc<DataManager>,
}

impl Harness {
    fn new(auto_link: bool) -> Self {
        Self::with_config(auto_link, EngineConfig::default())
    }

    fn with_config(auto_link: bool, config: EngineConfig) -> Self {
        let store = InMemoryStore::new();
        let persistence = Arc::new(InMemoryPersistenceService::new(Arc::clone(&store)));
        let persister = InMemoryBundlePersister::new(Arc::clone(&store));
        let matcher = Arc::new(InMemoryMatcher::new(Arc::clone(&store)));
        let configurations = Arc::new(InMemoryMatchConfigurationService::with_identity_config(
            vec![PATIENT.to_owned()],
            auto_link,
        ));
        let policy = Arc::new(AllowAllPolicy);

        let data_manager = Arc::new(
            DataManager::new(
                Arc::clone(&persistence) as Arc<dyn PersistenceService>,
                matcher,
                configurations,
                policy,
            )
            .with_config(config),
        );

        Self {
            persistence,
            persister,
            data_manager,
        }
    }

    fn provenance() -> Provenance {
        Provenance {
            application: PrincipalId::application("integration-tests"),
            device: None,
        }
    }

    fn caller() -> PrincipalId {
        PrincipalId::application("integration-tests")
    }

    fn patient(identifier: Option<(&str, &str)>, name: &str) -> Record {
        let mut record = Record::new_local(PATIENT, Self::provenance());
        if let Some((domain, value)) = identifier {
            record.identifiers.push(Identifier {
                domain: domain.to_owned(),
                value: value.to_owned(),
            });
        }
        record.demographics.names.push(DemographicValue {
            key: None,
            value: name.to_owned(),
        });
        record
    }

    async fn seed(&self, record: Record) {
        self.persistence.insert_record(record).await.unwrap();
    }

    async fn commit(&self, instructions: Vec<TxInstruction>) -> Vec<TxInstruction> {
        let mut bundle = mdm_collab::Bundle::new();
        bundle.extend(instructions);
        self.persister.commit(bundle).await.unwrap()
    }

    async fn get(&self, key: mdm_types::RecordKey) -> Record {
        self.persistence.get_record(key).await.unwrap().unwrap()
    }

    async fn master_view(&self, master: mdm_types::RecordKey) -> EntityMaster {
        let synthesizer = QuerySynthesizer::new(
            Arc::clone(&self.data_manager),
            Arc::clone(&self.persistence) as Arc<dyn mdm_collab::UnionPersistenceService>,
            Arc::new(AllowAllPolicy),
        );
        let rows = synthesizer
            .query(
                SynthesizedQuery::Domain(RecordFilter {
                    class: None,
                    identifier_domain_value: None,
                    keys: Some(vec![master]),
                    active_only: true,
                }),
                &Self::caller(),
                Page::default(),
            )
            .await
            .unwrap();
        // `keys` only scopes the MASTER side of the synthesized predicate pair;
        // the LOCAL side matches every active record in the store, so pick out
        // the row for the requested master rather than assuming it's the only one.
        rows.into_iter()
            .find_map(|row| match row {
                mdm_engine::RecordView::Master(view) if view.master().key == master => Some(view),
                _ => None,
            })
            .expect("the master row exists")
    }
}

fn created_master(instructions: &[TxInstruction]) -> &Record {
    instructions
        .iter()
        .filter_map(TxInstruction::as_record)
        .find(|record| record.is_master())
        .expect("a MASTER record was created")
}

fn relationships_of_type(instructions: &[TxInstruction], kind: RelationshipType) -> Vec<&mdm_types::Relationship> {
    instructions
        .iter()
        .filter_map(TxInstruction::as_relationship)
        .filter(|relationship| relationship.relationship_type == kind)
        .collect()
}

#[tokio::test]
async fn scenario_1_first_local_creates_a_master() {
    let harness = Harness::new(true);
    let local = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    let local_key = local.key;
    harness.seed(local.clone()).await;

    let instructions = harness.data_manager.match_and_link(local, &[]).await.unwrap();

    let master = created_master(&instructions);
    let links = relationships_of_type(&instructions, RelationshipType::MasterRecord);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].source, local_key);
    assert_eq!(links[0].target, master.key);
    assert_eq!(links[0].classification, Classification::System);

    assert!(relationships_of_type(&instructions, RelationshipType::Candidate).is_empty());

    harness.commit(instructions).await;
}

#[tokio::test]
async fn scenario_2_exact_match_autolinks_onto_the_same_master() {
    let harness = Harness::new(true);

    let first = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(first.clone()).await;
    let first_instructions = harness.data_manager.match_and_link(first, &[]).await.unwrap();
    let master = created_master(&first_instructions).key;
    harness.commit(first_instructions).await;

    let second = Harness::patient(Some(("NHID", "12345")), "J. Doe");
    harness.seed(second.clone()).await;
    let second_instructions = harness.data_manager.match_and_link(second.clone(), &[]).await.unwrap();

    let new_master_created = second_instructions
        .iter()
        .any(|instruction| matches!(instruction, TxInstruction::Record { .. }));
    assert!(!new_master_created, "no additional MASTER should be minted");

    let links = relationships_of_type(&second_instructions, RelationshipType::MasterRecord);
    let link = links
        .iter()
        .find(|relationship| relationship.source == second.key)
        .expect("second LOCAL linked to the existing MASTER");
    assert_eq!(link.target, master);
    assert_eq!(link.classification, Classification::Automagic);

    harness.commit(second_instructions).await;
}

#[tokio::test]
async fn scenario_3_probable_without_autolink_creates_a_candidate_and_a_new_master() {
    let harness = Harness::new(false);

    let first = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(first.clone()).await;
    let first_instructions = harness.data_manager.match_and_link(first, &[]).await.unwrap();
    let master = created_master(&first_instructions).key;
    harness.commit(first_instructions).await;

    // No shared identifier, shared name only -> Probable.
    let second = Harness::patient(None, "Jane Doe");
    harness.seed(second.clone()).await;
    let second_instructions = harness.data_manager.match_and_link(second.clone(), &[]).await.unwrap();

    let new_master = created_master(&second_instructions);
    let own_link = relationships_of_type(&second_instructions, RelationshipType::MasterRecord)
        .into_iter()
        .find(|relationship| relationship.source == second.key)
        .expect("L' links to its own new MASTER");
    assert_eq!(own_link.target, new_master.key);
    assert_eq!(own_link.classification, Classification::System);

    let candidate = relationships_of_type(&second_instructions, RelationshipType::Candidate)
        .into_iter()
        .find(|relationship| relationship.target == master)
        .expect("a Candidate(L' -> M) is recorded");
    let strength = candidate.strength.expect("candidate carries a strength").get();
    assert!(strength > 0.0 && strength < 1.0);

    harness.commit(second_instructions).await;
}

#[tokio::test]
async fn scenario_4_ignore_then_resubmit_produces_no_candidate() {
    let harness = Harness::new(false);

    let first = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(first.clone()).await;
    let first_instructions = harness.data_manager.match_and_link(first, &[]).await.unwrap();
    let master = created_master(&first_instructions).key;
    harness.commit(first_instructions).await;

    let second = Harness::patient(None, "Jane Doe");
    harness.seed(second.clone()).await;
    let second_instructions = harness.data_manager.match_and_link(second.clone(), &[]).await.unwrap();
    harness.commit(second_instructions).await;

    let ignore_instructions = harness.data_manager.ignore(master, second.key, &[]).await.unwrap();
    assert!(!relationships_of_type(&ignore_instructions, RelationshipType::IgnoreCandidate).is_empty());
    harness.commit(ignore_instructions).await;

    let record = harness.get(second.key).await;
    let resubmit_instructions = harness.data_manager.match_and_link(record, &[]).await.unwrap();

    let produced_candidate = relationships_of_type(&resubmit_instructions, RelationshipType::Candidate)
        .into_iter()
        .any(|relationship| relationship.target == master);
    assert!(!produced_candidate, "an ignored pair must not re-produce a Candidate");
}

#[tokio::test]
async fn scenario_5_merge_masters_folds_the_victim_into_the_survivor() {
    let harness = Harness::new(true);

    let l1 = Harness::patient(Some(("NHID", "111")), "Alpha");
    harness.seed(l1.clone()).await;
    let i1 = harness.data_manager.match_and_link(l1.clone(), &[]).await.unwrap();
    let survivor = created_master(&i1).key;
    harness.commit(i1).await;

    let l2 = Harness::patient(Some(("NHID", "222")), "Beta");
    harness.seed(l2.clone()).await;
    let i2 = harness.data_manager.match_and_link(l2.clone(), &[]).await.unwrap();
    let victim = created_master(&i2).key;
    harness.commit(i2).await;

    let merge_instructions = harness
        .data_manager
        .merge_masters(survivor, victim, &[])
        .await
        .unwrap();

    let redirected = relationships_of_type(&merge_instructions, RelationshipType::MasterRecord)
        .into_iter()
        .find(|relationship| relationship.source == l2.key && relationship.target == survivor)
        .expect("L2 now links to the survivor");
    assert_eq!(redirected.batch_operation, mdm_types::BatchOperation::Insert);

    let replaces = relationships_of_type(&merge_instructions, RelationshipType::Replaces);
    assert_eq!(replaces.len(), 1);
    assert_eq!(replaces[0].source, survivor);
    assert_eq!(replaces[0].target, victim);

    let victim_update = merge_instructions
        .iter()
        .filter_map(TxInstruction::as_record)
        .find(|record| record.key == victim)
        .expect("the victim MASTER is updated inactive");
    assert_eq!(victim_update.status, mdm_types::RecordStatus::Obsolete);

    harness.commit(merge_instructions).await;

    let survivor_record = harness.get(survivor).await;
    assert!(survivor_record
        .identifiers
        .iter()
        .any(|identifier| identifier.domain == "NHID" && identifier.value == "222"));
}

#[tokio::test]
async fn scenario_5b_unmerge_restores_the_victims_prior_attachment() {
    let harness = Harness::new(true);

    let l1 = Harness::patient(Some(("NHID", "111")), "Alpha");
    harness.seed(l1.clone()).await;
    let i1 = harness.data_manager.match_and_link(l1.clone(), &[]).await.unwrap();
    let survivor = created_master(&i1).key;
    harness.commit(i1).await;

    let l2 = Harness::patient(Some(("NHID", "222")), "Beta");
    harness.seed(l2.clone()).await;
    let i2 = harness.data_manager.match_and_link(l2.clone(), &[]).await.unwrap();
    let victim = created_master(&i2).key;
    harness.commit(i2).await;

    let merge_instructions = harness.data_manager.merge_masters(survivor, victim, &[]).await.unwrap();
    harness.commit(merge_instructions).await;

    let unmerge_instructions = harness.data_manager.unmerge_masters(survivor, victim, &[]).await.unwrap();
    harness.commit(unmerge_instructions).await;

    let restored_victim = harness.get(victim).await;
    assert_eq!(restored_victim.status, mdm_types::RecordStatus::Active);

    let current_link = harness
        .persistence
        .get_relationships(l2.key, Some(RelationshipType::MasterRecord))
        .await
        .unwrap();
    let current = current_link
        .into_iter()
        .find(|relationship| relationship.is_current())
        .expect("L2 has a current master link");
    assert_eq!(current.target, victim, "unmerge must put L2 back on its original master");
}

#[tokio::test]
async fn scenario_6_rot_promotion_projects_the_rot_fields_first() {
    let harness = Harness::new(true);

    let local = Harness::patient(Some(("NHID", "999")), "Original Name");
    harness.seed(local.clone()).await;
    let instructions = harness.data_manager.match_and_link(local.clone(), &[]).await.unwrap();
    let master = created_master(&instructions).key;
    harness.commit(instructions).await;

    let caller = Harness::caller();
    let rot_instructions = harness
        .data_manager
        .promote_record_of_truth(master, local.key, &caller, &[])
        .await
        .unwrap();

    let updated_local = rot_instructions
        .iter()
        .filter_map(TxInstruction::as_record)
        .find(|record| record.key == local.key)
        .expect("the LOCAL itself is updated to RecordOfTruth");
    assert_eq!(updated_local.determiner, mdm_types::Determiner::RecordOfTruth);

    let rot_link = relationships_of_type(&rot_instructions, RelationshipType::MasterRecordOfTruth);
    assert_eq!(rot_link.len(), 1);
    assert_eq!(rot_link[0].source, master);
    assert_eq!(rot_link[0].target, local.key);

    harness.commit(rot_instructions).await;

    let view = harness.master_view(master).await;
    let synthesized = view.synthesize();
    assert_eq!(synthesized.demographics.names[0].value, "Original Name");
}

#[tokio::test]
async fn ignore_unignore_round_trip_allows_a_candidate_again() {
    let harness = Harness::new(false);

    let first = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(first.clone()).await;
    let first_instructions = harness.data_manager.match_and_link(first, &[]).await.unwrap();
    let master = created_master(&first_instructions).key;
    harness.commit(first_instructions).await;

    let second = Harness::patient(None, "Jane Doe");
    harness.seed(second.clone()).await;
    let second_instructions = harness.data_manager.match_and_link(second.clone(), &[]).await.unwrap();
    harness.commit(second_instructions).await;

    let ignore_instructions = harness.data_manager.ignore(master, second.key, &[]).await.unwrap();
    harness.commit(ignore_instructions).await;

    let unignore_instructions = harness.data_manager.unignore(second.key, master, &[]).await.unwrap();
    assert!(
        relationships_of_type(&unignore_instructions, RelationshipType::Candidate)
            .iter()
            .any(|relationship| relationship.target == master),
        "unignore reruns match-and-link and should re-produce the Candidate"
    );
}

#[tokio::test]
async fn idempotent_resubmission_of_an_unchanged_local_adds_no_new_relationships() {
    let harness = Harness::new(true);

    let local = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(local.clone()).await;
    let first_instructions = harness.data_manager.match_and_link(local.clone(), &[]).await.unwrap();
    harness.commit(first_instructions).await;

    let stored = harness.get(local.key).await;
    let second_instructions = harness.data_manager.match_and_link(stored, &[]).await.unwrap();

    let new_links = relationships_of_type(&second_instructions, RelationshipType::MasterRecord);
    assert!(new_links.is_empty(), "resubmitting the same LOCAL must not mint another MasterRecord link");
}

#[tokio::test]
async fn current_master_record_count_per_local_is_never_more_than_one() {
    let harness = Harness::new(true);

    let local = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(local.clone()).await;
    let instructions = harness.data_manager.match_and_link(local.clone(), &[]).await.unwrap();
    harness.commit(instructions).await;

    let links = harness
        .persistence
        .get_relationships(local.key, Some(RelationshipType::MasterRecord))
        .await
        .unwrap();
    let current = links.iter().filter(|relationship| relationship.is_current()).count();
    assert_eq!(current, 1);
}

#[tokio::test]
async fn merger_folds_two_masters_and_leaves_a_replaces_pointer() {
    let harness = Harness::new(true);

    let l1 = Harness::patient(Some(("NHID", "111")), "Alpha");
    harness.seed(l1.clone()).await;
    let i1 = harness.data_manager.match_and_link(l1, &[]).await.unwrap();
    let survivor = created_master(&i1).key;
    harness.commit(i1).await;

    let l2 = Harness::patient(Some(("NHID", "222")), "Beta");
    harness.seed(l2.clone()).await;
    let i2 = harness.data_manager.match_and_link(l2, &[]).await.unwrap();
    let victim = created_master(&i2).key;
    harness.commit(i2).await;

    let merger = Merger::new(
        Arc::clone(&harness.data_manager),
        Arc::new(harness.persister.clone()) as Arc<dyn BundlePersister>,
        Arc::new(AllowAllPolicy),
    );

    let pair = MergePair { a: survivor, b: victim };
    let mut event = CancellableEvent::new(pair);
    let instructions = merger.merge(pair, &Harness::caller(), &mut event).await.unwrap();

    assert!(relationships_of_type(&instructions, RelationshipType::Replaces)
        .iter()
        .any(|relationship| relationship.source == survivor));

    let victim_record = harness.get(victim).await;
    assert_eq!(victim_record.status, mdm_types::RecordStatus::Obsolete);
}

#[tokio::test]
async fn merger_skips_work_when_the_event_is_cancelled() {
    let harness = Harness::new(true);

    let l1 = Harness::patient(Some(("NHID", "111")), "Alpha");
    harness.seed(l1.clone()).await;
    let i1 = harness.data_manager.match_and_link(l1, &[]).await.unwrap();
    let survivor = created_master(&i1).key;
    harness.commit(i1).await;

    let l2 = Harness::patient(Some(("NHID", "222")), "Beta");
    harness.seed(l2.clone()).await;
    let i2 = harness.data_manager.match_and_link(l2, &[]).await.unwrap();
    let victim = created_master(&i2).key;
    harness.commit(i2).await;

    let merger = Merger::new(
        Arc::clone(&harness.data_manager),
        Arc::new(harness.persister.clone()) as Arc<dyn BundlePersister>,
        Arc::new(AllowAllPolicy),
    );

    let pair = MergePair { a: survivor, b: victim };
    let mut event = CancellableEvent::new(pair);
    event.cancel();
    let instructions = merger.merge(pair, &Harness::caller(), &mut event).await.unwrap();
    assert!(instructions.is_empty());

    let victim_record = harness.get(victim).await;
    assert_eq!(victim_record.status, mdm_types::RecordStatus::Active, "a cancelled merge must not touch storage");
}

#[tokio::test]
async fn query_synthesizer_returns_one_master_row_per_identifier_owner() {
    let harness = Harness::new(true);
    let local = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(local.clone()).await;
    let instructions = harness.data_manager.match_and_link(local, &[]).await.unwrap();
    harness.commit(instructions).await;

    let synthesizer = QuerySynthesizer::new(
        Arc::clone(&harness.data_manager),
        Arc::clone(&harness.persistence) as Arc<dyn mdm_collab::UnionPersistenceService>,
        Arc::new(AllowAllPolicy),
    );
    let rows = synthesizer
        .query(
            SynthesizedQuery::Domain(RecordFilter {
                class: Some(RecordClass::Domain(PATIENT.to_owned())),
                identifier_domain_value: Some(("NHID".to_owned(), "12345".to_owned())),
                keys: None,
                active_only: true,
            }),
            &Harness::caller(),
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn detect_formal_issues_is_clean_once_linked_and_flags_an_unlinked_local() {
    let harness = Harness::new(true);

    let local = Harness::patient(Some(("NHID", "12345")), "Jane Doe");
    harness.seed(local.clone()).await;

    let unlinked = harness.data_manager.detect_formal_issues(local.key, &[]).await.unwrap();
    assert_eq!(
        unlinked,
        vec![FormalIssue::OrphanDetected {
            local: local.key,
            current_master_count: 0,
        }]
    );

    let instructions = harness.data_manager.match_and_link(local.clone(), &[]).await.unwrap();
    harness.commit(instructions).await;

    let linked = harness.data_manager.detect_formal_issues(local.key, &[]).await.unwrap();
    assert!(linked.is_empty(), "a LOCAL with exactly one current master link has no formal issue");
}

#[tokio::test]
async fn link_moves_a_local_onto_a_different_master_and_unlink_detaches_it_again() {
    let harness = Harness::new(true);

    let l1 = Harness::patient(Some(("NHID", "111")), "Alpha");
    harness.seed(l1.clone()).await;
    let i1 = harness.data_manager.match_and_link(l1.clone(), &[]).await.unwrap();
    let master_a = created_master(&i1).key;
    harness.commit(i1).await;

    let l2 = Harness::patient(Some(("NHID", "222")), "Beta");
    harness.seed(l2.clone()).await;
    let i2 = harness.data_manager.match_and_link(l2.clone(), &[]).await.unwrap();
    let master_b = created_master(&i2).key;
    harness.commit(i2).await;

    // `link` is order-independent: pass (local, master) and it normalizes.
    let link_instructions = harness.data_manager.link(l2.key, master_a, true, &[]).await.unwrap();
    let moved = relationships_of_type(&link_instructions, RelationshipType::MasterRecord)
        .into_iter()
        .find(|relationship| relationship.source == l2.key && relationship.target == master_a)
        .expect("L2 now links to master A");
    assert_eq!(moved.classification, Classification::Verified);

    // Master B is left with no current LOCAL and gets retired with a
    // Replaces back-pointer under the default UnlinkMode::Replace.
    let replaces = relationships_of_type(&link_instructions, RelationshipType::Replaces);
    assert_eq!(replaces.len(), 1);
    assert_eq!(replaces[0].source, master_a);
    assert_eq!(replaces[0].target, master_b);
    let retired_master_b = link_instructions
        .iter()
        .filter_map(TxInstruction::as_record)
        .find(|record| record.key == master_b)
        .expect("master B is updated");
    assert_eq!(retired_master_b.status, mdm_types::RecordStatus::Obsolete);

    harness.commit(link_instructions).await;

    let unlink_instructions = harness.data_manager.unlink(l2.key, master_a, &[]).await.unwrap();
    let detached = relationships_of_type(&unlink_instructions, RelationshipType::MasterRecord)
        .into_iter()
        .find(|relationship| relationship.source == l2.key && relationship.target == master_a)
        .expect("the MasterRecord(L2 -> A) link is marked deleted");
    assert_eq!(detached.batch_operation, mdm_types::BatchOperation::Delete);

    let ignore = relationships_of_type(&unlink_instructions, RelationshipType::IgnoreCandidate)
        .into_iter()
        .find(|relationship| relationship.source == l2.key && relationship.target == master_a)
        .expect("unlink suppresses L2 rejoining master A via symmetric matching");
    assert_eq!(ignore.classification, Classification::Verified);

    harness.commit(unlink_instructions).await;

    let current = harness
        .persistence
        .get_relationships(l2.key, Some(RelationshipType::MasterRecord))
        .await
        .unwrap()
        .into_iter()
        .find(|relationship| relationship.is_current());
    assert!(
        current.is_none() || current.unwrap().target != master_a,
        "L2 must not still carry a current link to master A after unlink"
    );
}

#[tokio::test]
async fn unlink_mode_delete_removes_the_emptied_master_instead_of_obsoleting_it() {
    let harness = Harness::with_config(
        true,
        EngineConfig {
            master_unlink_mode: UnlinkMode::Delete,
        },
    );

    let l1 = Harness::patient(Some(("NHID", "111")), "Alpha");
    harness.seed(l1.clone()).await;
    let i1 = harness.data_manager.match_and_link(l1.clone(), &[]).await.unwrap();
    let master_a = created_master(&i1).key;
    harness.commit(i1).await;

    let l2 = Harness::patient(Some(("NHID", "222")), "Beta");
    harness.seed(l2.clone()).await;
    let i2 = harness.data_manager.match_and_link(l2.clone(), &[]).await.unwrap();
    let master_b = created_master(&i2).key;
    harness.commit(i2).await;

    let link_instructions = harness.data_manager.link(l2.key, master_a, true, &[]).await.unwrap();

    assert!(
        relationships_of_type(&link_instructions, RelationshipType::Replaces).is_empty(),
        "UnlinkMode::Delete must not leave a Replaces back-pointer"
    );
    let deleted = link_instructions
        .iter()
        .find(|instruction| match instruction {
            TxInstruction::Record { record, operation } => {
                record.key == master_b && *operation == mdm_types::BatchOperation::Delete
            }
            TxInstruction::Relationship(_) => false,
        })
        .expect("master B is deleted outright, not obsoleted");
    assert!(matches!(deleted, TxInstruction::Record { .. }));
}
