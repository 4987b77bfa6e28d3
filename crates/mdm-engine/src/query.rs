//! C5: the Query Synthesizer. Rewrites a query expressed over the domain
//! model into a MASTER predicate and a LOCAL predicate, submits both to a
//! union-capable persistence service, and wraps each resulting row as a
//! Master View (§4.4).

use std::sync::Arc;

use mdm_collab::{
    error::PersistenceFailure, persistence::RecordFilter, Page, PolicyEnforcement, Policy,
    UnionPersistenceService,
};
use mdm_types::{PrincipalId, RecordClass, RecordKey};

use crate::{resolution::DataManager, view::RecordView};

/// The one MDM-recognized filter shape a caller can express directly: "give
/// me LOCALs", which demands the read-mdm-locals permission (§4.4 step 1).
/// Anything else is assumed to be a domain-model predicate that gets
/// rewritten into the MASTER/LOCAL pair.
#[derive(Debug, Clone)]
pub enum SynthesizedQuery {
    Locals(RecordFilter),
    Domain(RecordFilter),
}

/// A restartable cursor over synthesized Master View rows (§9 "Stateful
/// query results"): wraps a server-assigned offset rather than buffering
/// the full result set, matching the §4.4 contract (skip/take/count/
/// first/single — modeled here as `advance`/`Page`, the richer combinator
/// set is left to the caller composing over `Vec<RecordView>` pages).
pub struct MasterResultSet<'a> {
    synthesizer: &'a QuerySynthesizer,
    filter: RecordFilter,
    offset: usize,
    page_size: usize,
}

impl<'a> MasterResultSet<'a> {
    /// Fetches the next page and advances the cursor's offset, so a second
    /// call resumes where the first left off rather than re-scanning.
    pub async fn advance(&mut self) -> error_stack::Result<Vec<RecordView>, PersistenceFailure> {
        let page = Page {
            offset: self.offset,
            limit: self.page_size,
        };
        let rows = self
            .synthesizer
            .fetch_master_page(&self.filter, page)
            .await?;
        self.offset += rows.len();
        Ok(rows)
    }
}

/// Rewrites domain-model queries onto the MASTER/LOCAL relationship graph
/// (§4.4).
pub struct QuerySynthesizer {
    data_manager: Arc<DataManager>,
    union_persistence: Arc<dyn UnionPersistenceService>,
    policy: Arc<dyn PolicyEnforcement>,
}

impl QuerySynthesizer {
    #[must_use]
    pub fn new(
        data_manager: Arc<DataManager>,
        union_persistence: Arc<dyn UnionPersistenceService>,
        policy: Arc<dyn PolicyEnforcement>,
    ) -> Self {
        Self {
            data_manager,
            union_persistence,
            policy,
        }
    }

    /// §4.4 steps 1-4: recognizes the `tag[$mdm.type] = L` filter and
    /// demands read-mdm-locals; otherwise rewrites into a MASTER/LOCAL pair
    /// and submits both to the union-capable persistence service, wrapping
    /// each row as a Master View.
    pub async fn query(
        &self,
        query: SynthesizedQuery,
        caller: &PrincipalId,
        page: Page,
    ) -> error_stack::Result<Vec<RecordView>, PersistenceFailure> {
        match query {
            SynthesizedQuery::Locals(filter) => {
                self.policy
                    .demand(Policy::ReadMdmLocals, caller)
                    .await
                    .map_err(|report| report.change_context(PersistenceFailure))?;
                let mut filter = filter;
                filter.class = None;
                let locals = self.union_persistence.query_records(&filter, page).await?;
                Ok(locals.into_iter().map(RecordView::Raw).collect())
            }
            SynthesizedQuery::Domain(filter) => self.fetch_master_page(&filter, page).await,
        }
    }

    /// Begins a restartable cursor over `filter`'s MASTER rows (§9
    /// "Stateful query results").
    #[must_use]
    pub fn query_restartable(&self, filter: RecordFilter, page_size: usize) -> MasterResultSet<'_> {
        MasterResultSet {
            synthesizer: self,
            filter,
            offset: 0,
            page_size,
        }
    }

    async fn fetch_master_page(
        &self,
        filter: &RecordFilter,
        page: Page,
    ) -> error_stack::Result<Vec<RecordView>, PersistenceFailure> {
        let master_predicate = RecordFilter {
            class: Some(RecordClass::Master),
            identifier_domain_value: filter.identifier_domain_value.clone(),
            keys: filter.keys.clone(),
            active_only: filter.active_only,
        };
        let local_predicate = RecordFilter {
            class: None,
            identifier_domain_value: filter.identifier_domain_value.clone(),
            keys: None,
            active_only: true,
        };

        let matched = self
            .union_persistence
            .query_union(&master_predicate, &local_predicate, page)
            .await?;

        // `matched` mixes MASTER rows (from `master_predicate`) with LOCAL
        // rows (from `local_predicate`); resolve every row to the MASTER it
        // belongs to before synthesizing, deduplicating so a MASTER with
        // several matching LOCALs contributes one row, not one per LOCAL.
        let mut seen = std::collections::HashSet::new();
        let mut rows = Vec::with_capacity(matched.len());
        for record in matched {
            let Some(master_key) = self.data_manager.resolve_to_master(record.key, &[]).await? else {
                continue;
            };
            if !seen.insert(master_key) {
                continue;
            }
            let view = self.data_manager.load_master_view(master_key, &[]).await?;
            rows.push(RecordView::Master(view));
        }
        Ok(rows)
    }

    /// §4.4 step 1's unsupported branch made explicit: querying MASTER keys
    /// directly via `tag[$mdm.type] = M` is not a recognized entry point —
    /// callers reach MASTERs only through the rewritten domain query.
    pub fn reject_direct_master_query(_key: RecordKey) -> error_stack::Result<(), PersistenceFailure> {
        Err(error_stack::Report::new(PersistenceFailure)
            .attach_printable("querying by tag[$mdm.type] = M directly is unsupported; use a domain-model filter"))
    }
}
