use std::collections::HashSet;

use async_trait::async_trait;
use error_stack::Result;
use mdm_types::{Record, RecordClass, RecordKey, Relationship, RelationshipType};

use crate::error::PersistenceFailure;

/// A query over records, expressed as the small set of predicates the
/// engine itself needs to issue (§4.4's MASTER/LOCAL predicate pair, and the
/// Batch-Match job's full-corpus page scan). Richer ad hoc querying is the
/// caller's problem, not this collaborator's.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub class: Option<RecordClass>,
    pub identifier_domain_value: Option<(String, String)>,
    pub keys: Option<Vec<RecordKey>>,
    pub active_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

/// Generic persistence collaborator (§6), covering both `Record` and
/// `Relationship`. A union-capable variant is optional per spec; callers
/// that need to combine a MASTER predicate and a LOCAL predicate in one
/// page use [`UnionPersistenceService::query_union`].
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn get_record(&self, key: RecordKey) -> Result<Option<Record>, PersistenceFailure>;

    async fn query_records(
        &self,
        filter: &RecordFilter,
        page: Page,
    ) -> Result<Vec<Record>, PersistenceFailure>;

    async fn insert_record(&self, record: Record) -> Result<Record, PersistenceFailure>;

    async fn update_record(&self, record: Record) -> Result<Record, PersistenceFailure>;

    async fn delete_record(&self, key: RecordKey) -> Result<(), PersistenceFailure>;

    async fn get_relationships(
        &self,
        source: RecordKey,
        relationship_type: Option<RelationshipType>,
    ) -> Result<Vec<Relationship>, PersistenceFailure>;

    async fn get_relationships_to(
        &self,
        target: RecordKey,
        relationship_type: Option<RelationshipType>,
    ) -> Result<Vec<Relationship>, PersistenceFailure>;

    async fn insert_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, PersistenceFailure>;

    async fn update_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, PersistenceFailure>;

    async fn delete_relationship(&self, key: mdm_types::RelationshipKey) -> Result<(), PersistenceFailure>;
}

/// Optional union-capable extension (§6), required only when the Query
/// Synthesizer (§4.4) must combine a MASTER predicate and a LOCAL predicate
/// into a single paged result.
#[async_trait]
pub trait UnionPersistenceService: PersistenceService {
    async fn query_union(
        &self,
        master_predicate: &RecordFilter,
        local_predicate: &RecordFilter,
        page: Page,
    ) -> Result<Vec<Record>, PersistenceFailure>;
}

/// Keys to exclude from a match pass: the ignore set built in §4.2.1 step 4.
pub type IgnoreKeySet = HashSet<RecordKey>;
