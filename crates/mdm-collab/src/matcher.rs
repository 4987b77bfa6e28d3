use async_trait::async_trait;
use error_stack::Result;
use mdm_types::{Record, RecordKey, Strength};

use crate::{error::MatcherFailure, persistence::IgnoreKeySet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchClassification {
    Match,
    Probable,
    NonMatch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub target: RecordKey,
    pub classification: MatchClassification,
    pub strength: Strength,
}

/// Given a `Record` and a configuration id, returns candidate results
/// classified as Match | Probable | NonMatch with a numeric strength (§6).
/// The matching rule language itself is out of scope — this is the seam.
#[async_trait]
pub trait Matcher: Send + Sync {
    async fn evaluate(
        &self,
        record: &Record,
        configuration_id: &str,
        ignore: &IgnoreKeySet,
    ) -> Result<Vec<MatchResult>, MatcherFailure>;

    /// §4.2.1 step 7: classify a LOCAL against a single MASTER's
    /// synthesized view, used to decide whether a relocated LOCAL should
    /// stay put, become a candidate, or be evicted.
    async fn classify_against(
        &self,
        record: &Record,
        master_view: &Record,
        configuration_id: &str,
    ) -> Result<(MatchClassification, Strength), MatcherFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigurationStatus {
    Active,
    Inactive,
}

/// One active match configuration (§6): an id, the model types it applies
/// to, a status, and a tag bag (`$mdm.auto-link` among others).
#[derive(Debug, Clone)]
pub struct MatchConfiguration {
    pub id: String,
    pub applicable_types: Vec<String>,
    pub status: ConfigurationStatus,
    pub tags: std::collections::HashMap<String, String>,
}

impl MatchConfiguration {
    #[must_use]
    pub fn auto_link(&self) -> bool {
        self.tags
            .get(mdm_types::tags::MDM_AUTO_LINK)
            .is_some_and(|value| value == "true")
    }
}

#[async_trait]
pub trait MatchConfigurationService: Send + Sync {
    /// Enumerates active configurations applicable to a model type (§4.2.1
    /// step 6).
    async fn active_configurations(
        &self,
        model_type: &str,
    ) -> Result<Vec<MatchConfiguration>, MatcherFailure>;
}
