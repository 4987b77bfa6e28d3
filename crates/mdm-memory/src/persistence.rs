//! An in-memory [`PersistenceService`]/[`UnionPersistenceService`]/
//! [`BundlePersister`] triple sharing one [`InMemoryStore`]: the reference
//! fixture the engine's own test suite and `tests/integration` build on, in
//! place of a real database.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use error_stack::Result;
use mdm_collab::{
    bundle::{Bundle, BundlePersister},
    error::{CommitFailure, PersistenceFailure},
    persistence::{Page, RecordFilter},
    PersistenceService, UnionPersistenceService,
};
use mdm_types::{
    BatchOperation, CreationSequence, ObsoletionSequence, Record, RecordKey, RecordStatus,
    Relationship, RelationshipKey, RelationshipType, TxInstruction,
};

/// Shared storage behind [`InMemoryPersistenceService`] and
/// [`InMemoryBundlePersister`]. Held in an `Arc` so a test can construct one
/// store and hand both collaborator facades a handle to it, the way a real
/// deployment's persistence service and bundle persister share one
/// database.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<RecordKey, Record>>,
    relationships: Mutex<HashMap<RelationshipKey, Relationship>>,
    sequence: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds the store with a record, returning its key for convenience in
    /// test setup.
    pub fn seed_record(&self, record: Record) -> RecordKey {
        let key = record.key;
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(key, record);
        key
    }

    pub fn seed_relationship(&self, relationship: Relationship) -> RelationshipKey {
        let key = relationship.key;
        self.relationships
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, relationship);
        key
    }

    fn next_sequence(&self) -> ObsoletionSequence {
        ObsoletionSequence::new(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Shares the same clock as [`Self::next_sequence`] — one monotonic
    /// counter orders every mutation the store sees, creations and
    /// obsoletions alike.
    fn next_creation_sequence(&self) -> CreationSequence {
        CreationSequence::new(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn all_records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// The MASTER `key` currently resolves to: `key` itself if it already
    /// names a MASTER, else the target of its current `MasterRecord`
    /// relationship, else `key` (unattached LOCAL). Used by
    /// [`crate::matcher::InMemoryMatcher`] so an ignore set built from
    /// resolved MASTER keys actually suppresses matches reached through any
    /// LOCAL attached to that MASTER, not just the exact key a candidate
    /// names.
    pub(crate) fn current_master_of(&self, key: RecordKey) -> RecordKey {
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if records.get(&key).is_some_and(|record| record.is_master()) {
            return key;
        }
        drop(records);

        self.relationships
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .find(|relationship| {
                relationship.source == key
                    && relationship.relationship_type == RelationshipType::MasterRecord
                    && relationship.is_current()
            })
            .map_or(key, |relationship| relationship.target)
    }

    fn matches(filter: &RecordFilter, record: &Record) -> bool {
        if let Some(class) = &filter.class {
            if &record.class != class {
                return false;
            }
        }
        if let Some(keys) = &filter.keys {
            if !keys.contains(&record.key) {
                return false;
            }
        }
        if filter.active_only && record.status != RecordStatus::Active {
            return false;
        }
        if let Some((domain, value)) = &filter.identifier_domain_value {
            let has_identifier = record
                .identifiers
                .iter()
                .any(|identifier| &identifier.domain == domain && &identifier.value == value);
            if !has_identifier {
                return false;
            }
        }
        true
    }

    /// `limit == 0` means "unbounded" — `Page::default()` is the all-rows
    /// page, matching callers that only care about `offset`-based paging.
    fn paginate<T>(rows: Vec<T>, page: Page) -> Vec<T> {
        let limit = if page.limit == 0 { usize::MAX } else { page.limit };
        rows.into_iter().skip(page.offset).take(limit).collect()
    }
}

/// Facade over [`InMemoryStore`] implementing the persistence collaborator
/// contracts.
#[derive(Debug, Clone)]
pub struct InMemoryPersistenceService {
    store: Arc<InMemoryStore>,
}

impl InMemoryPersistenceService {
    #[must_use]
    pub const fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistenceService {
    async fn get_record(&self, key: RecordKey) -> Result<Option<Record>, PersistenceFailure> {
        Ok(self
            .store
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
            .cloned())
    }

    async fn query_records(&self, filter: &RecordFilter, page: Page) -> Result<Vec<Record>, PersistenceFailure> {
        let mut rows: Vec<Record> = self
            .store
            .all_records()
            .into_iter()
            .filter(|record| InMemoryStore::matches(filter, record))
            .collect();
        rows.sort_by_key(|record| record.key);
        Ok(InMemoryStore::paginate(rows, page))
    }

    async fn insert_record(&self, record: Record) -> Result<Record, PersistenceFailure> {
        let mut record = record;
        if record.creation_sequence.is_none() {
            record.creation_sequence = Some(self.store.next_creation_sequence());
        }
        self.store
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(record.key, record.clone());
        Ok(record)
    }

    async fn update_record(&self, record: Record) -> Result<Record, PersistenceFailure> {
        self.store
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(record.key, record.clone());
        Ok(record)
    }

    async fn delete_record(&self, key: RecordKey) -> Result<(), PersistenceFailure> {
        let mut records = self.store.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(record) = records.get_mut(&key) {
            record.status = RecordStatus::Nullified;
        }
        Ok(())
    }

    async fn get_relationships(
        &self,
        source: RecordKey,
        relationship_type: Option<RelationshipType>,
    ) -> Result<Vec<Relationship>, PersistenceFailure> {
        Ok(self
            .store
            .relationships
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|relationship| {
                relationship.source == source
                    && relationship_type.is_none_or_matches(relationship.relationship_type)
            })
            .cloned()
            .collect())
    }

    async fn get_relationships_to(
        &self,
        target: RecordKey,
        relationship_type: Option<RelationshipType>,
    ) -> Result<Vec<Relationship>, PersistenceFailure> {
        Ok(self
            .store
            .relationships
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|relationship| {
                relationship.target == target
                    && relationship_type.is_none_or_matches(relationship.relationship_type)
            })
            .cloned()
            .collect())
    }

    async fn insert_relationship(&self, relationship: Relationship) -> Result<Relationship, PersistenceFailure> {
        self.store
            .relationships
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(relationship.key, relationship.clone());
        Ok(relationship)
    }

    async fn update_relationship(&self, relationship: Relationship) -> Result<Relationship, PersistenceFailure> {
        self.store
            .relationships
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(relationship.key, relationship.clone());
        Ok(relationship)
    }

    async fn delete_relationship(&self, key: RelationshipKey) -> Result<(), PersistenceFailure> {
        let sequence = self.store.next_sequence();
        let mut relationships = self.store.relationships.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(relationship) = relationships.get_mut(&key) {
            relationship.obsoleted_at = Some(sequence);
        }
        Ok(())
    }
}

#[async_trait]
impl UnionPersistenceService for InMemoryPersistenceService {
    async fn query_union(
        &self,
        master_predicate: &RecordFilter,
        local_predicate: &RecordFilter,
        page: Page,
    ) -> Result<Vec<Record>, PersistenceFailure> {
        let all = self.store.all_records();
        let mut seen = std::collections::HashSet::new();
        let mut rows = Vec::new();
        for record in &all {
            if InMemoryStore::matches(master_predicate, record) && seen.insert(record.key) {
                rows.push(record.clone());
            }
        }
        for record in &all {
            if InMemoryStore::matches(local_predicate, record) && seen.insert(record.key) {
                rows.push(record.clone());
            }
        }
        rows.sort_by_key(|record| record.key);
        Ok(InMemoryStore::paginate(rows, page))
    }
}

/// Applies a [`Bundle`] to an [`InMemoryStore`]: records and relationships
/// tagged `Delete` are obsoleted rather than dropped (relationships gain a
/// fresh [`ObsoletionSequence`]; records move to [`RecordStatus::Obsolete`])
/// so the audit trail merge/unmerge/unlink rely on stays queryable. A freshly
/// inserted or updated record without one gains a [`CreationSequence`] here.
#[derive(Debug, Clone)]
pub struct InMemoryBundlePersister {
    store: Arc<InMemoryStore>,
}

impl InMemoryBundlePersister {
    #[must_use]
    pub const fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BundlePersister for InMemoryBundlePersister {
    async fn commit(&self, bundle: Bundle) -> Result<Vec<TxInstruction>, CommitFailure> {
        for instruction in bundle.instructions() {
            match instruction {
                TxInstruction::Record { record, operation } => {
                    match operation {
                        BatchOperation::Delete => {
                            let mut obsoleted = record.clone();
                            obsoleted.status = RecordStatus::Obsolete;
                            self.store
                                .records
                                .lock()
                                .unwrap_or_else(std::sync::PoisonError::into_inner)
                                .insert(record.key, obsoleted);
                        }
                        BatchOperation::Insert | BatchOperation::Update | BatchOperation::InsertOrUpdate => {
                            let mut record = record.clone();
                            if record.creation_sequence.is_none() {
                                record.creation_sequence = Some(self.store.next_creation_sequence());
                            }
                            self.store
                                .records
                                .lock()
                                .unwrap_or_else(std::sync::PoisonError::into_inner)
                                .insert(record.key, record);
                        }
                    }
                }
                TxInstruction::Relationship(relationship) => {
                    let mut relationship = relationship.clone();
                    if relationship.batch_operation == BatchOperation::Delete && relationship.obsoleted_at.is_none() {
                        relationship.obsoleted_at = Some(self.store.next_sequence());
                    }
                    self.store
                        .relationships
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .insert(relationship.key, relationship);
                }
            }
        }
        Ok(bundle.into_instructions())
    }
}

trait OptionRelationshipTypeExt {
    fn is_none_or_matches(self, actual: RelationshipType) -> bool;
}

impl OptionRelationshipTypeExt for Option<RelationshipType> {
    fn is_none_or_matches(self, actual: RelationshipType) -> bool {
        match self {
            None => true,
            Some(expected) => expected == actual,
        }
    }
}
