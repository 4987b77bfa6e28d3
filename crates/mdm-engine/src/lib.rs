//! The MDM resolution engine (C2 through C8): the Master View, the Data
//! Manager, the Resource Interceptor, the Query Synthesizer, the Merger,
//! the Bundle Interceptor, and the Batch-Match job. `mdm-collab` names the
//! collaborator contracts this crate consumes; `mdm-types` owns the data
//! model it operates on.

pub mod batch;
pub mod bundle_interceptor;
pub mod cache;
pub mod config;
pub mod interceptor;
pub mod merger;
pub mod query;
pub mod resolution;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod view;

pub use batch::{BatchMatchJob, JobState};
pub use bundle_interceptor::{commit_passthrough, BundleInterceptor, BundleItem, DispatchOutcome};
pub use cache::{InMemoryMasterLinkCache, MasterLinkCache};
pub use config::{BatchMatchConfig, EngineConfig, UnlinkMode};
pub use interceptor::{InterceptResult, ResourceInterceptor, RetrievingOutcome, SavingEvent};
pub use merger::{MergePair, Merger, ResetParams};
pub use query::{MasterResultSet, QuerySynthesizer, SynthesizedQuery};
pub use resolution::{dedup_relationships_by_target, DataManager, MasterLinkArgs};
pub use view::{EntityMaster, RecordView};
