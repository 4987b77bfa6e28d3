//! C8: the Batch-Match job. Pages through the active corpus via a stateful
//! query and resubmits each key to the Merger's candidate-detection entry
//! point (§4.7), the loop form of §9's open question rather than a no-op
//! stub — so a deployment can actually re-run matching after a
//! configuration change.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use mdm_collab::{persistence::RecordFilter, MdmError, Page, PersistenceService};
use mdm_types::PrincipalId;

use crate::{config::BatchMatchConfig, merger::Merger};

/// Terminal/in-progress state of a running job (§5 "Cancellation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
    Aborted,
}

/// Pages through the active corpus, submitting each key encountered to
/// [`Merger::detect_global_merge_candidates`]. `cancel()` may be called
/// concurrently from another task; the loop observes it between pages, not
/// mid-page, matching §5's "must check between pages" requirement.
pub struct BatchMatchJob {
    persistence: Arc<dyn PersistenceService>,
    merger: Arc<Merger>,
    config: BatchMatchConfig,
    model_type: String,
    cancelled: AtomicBool,
    processed: std::sync::atomic::AtomicUsize,
    total: usize,
}

impl BatchMatchJob {
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        merger: Arc<Merger>,
        config: BatchMatchConfig,
        model_type: impl Into<String>,
        total: usize,
    ) -> Self {
        Self {
            persistence,
            merger,
            config,
            model_type: model_type.into(),
            cancelled: AtomicBool::new(false),
            processed: std::sync::atomic::AtomicUsize::new(0),
            total,
        }
    }

    /// Requests cancellation; observed at the next page boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Fraction of the corpus processed so far, in `[0.0, 1.0]`. `0.0` when
    /// `total` is unknown (zero), matching an empty corpus rather than
    /// dividing by zero.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[expect(
            clippy::cast_precision_loss,
            reason = "progress is a coarse UI fraction, not an exact count"
        )]
        let fraction = self.processed.load(Ordering::SeqCst) as f32 / self.total as f32;
        fraction
    }

    /// Runs the job to completion (or to `Aborted`, if `cancel()` was
    /// observed between pages). `configuration_name` is accepted per §6's
    /// `mdm-match` operation endpoint but this job re-runs *all* active
    /// configurations for the type via `match_and_link`; narrowing to one
    /// named configuration is a matcher-side concern, not this loop's.
    pub async fn run(&self, caller: &PrincipalId, _configuration_name: Option<&str>) -> error_stack::Result<JobState, MdmError> {
        let mut offset = 0;
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Ok(JobState::Aborted);
            }

            let filter = RecordFilter {
                class: Some(mdm_types::RecordClass::Domain(self.model_type.clone())),
                identifier_domain_value: None,
                keys: None,
                active_only: true,
            };
            let page = Page {
                offset,
                limit: self.config.page_size.get(),
            };
            let batch = self
                .persistence
                .query_records(&filter, page)
                .await
                .map_err(|report| report.change_context(MdmError::Persistence))?;

            if batch.is_empty() {
                return Ok(JobState::Completed);
            }

            for record in &batch {
                if self.cancelled.load(Ordering::SeqCst) {
                    return Ok(JobState::Aborted);
                }
                self.merger
                    .detect_global_merge_candidates(record.key, caller)
                    .await?;
                self.processed.fetch_add(1, Ordering::SeqCst);
            }

            offset += batch.len();
        }
    }
}
