//! An in-memory reference [`Matcher`]/[`MatchConfigurationService`] pair.
//! Classification is deliberately simple — exact shared identifier is a
//! `Match`, a shared name with no shared identifier is `Probable`, anything
//! else is `NonMatch` — since the matching rule language itself is out of
//! scope (§6); this exists to drive the engine's own tests, not to be a
//! realistic production matcher.

use std::sync::Arc;

use async_trait::async_trait;
use error_stack::Result;
use mdm_collab::{
    error::MatcherFailure,
    matcher::{ConfigurationStatus, MatchClassification, MatchConfiguration, MatchConfigurationService, MatchResult, Matcher},
    persistence::IgnoreKeySet,
};
use mdm_types::{tags, Record, RecordStatus, Strength};

use crate::persistence::InMemoryStore;

/// The well-known identity configuration id named in §6.
pub const IDENTITY_CONFIGURATION_ID: &str = "$identity";

fn shares_identifier(a: &Record, b: &Record) -> bool {
    a.identifiers.iter().any(|left| {
        b.identifiers
            .iter()
            .any(|right| left.domain == right.domain && left.value == right.value)
    })
}

fn shares_name(a: &Record, b: &Record) -> bool {
    a.demographics.names.iter().any(|left| {
        b.demographics
            .names
            .iter()
            .any(|right| left.value.eq_ignore_ascii_case(&right.value))
    })
}

fn classify(record: &Record, other: &Record) -> (MatchClassification, Strength) {
    if shares_identifier(record, other) {
        #[expect(clippy::unwrap_used, reason = "1.0 is within Strength's valid range")]
        (MatchClassification::Match, Strength::new(1.0).unwrap())
    } else if shares_name(record, other) {
        #[expect(clippy::unwrap_used, reason = "0.6 is within Strength's valid range")]
        (MatchClassification::Probable, Strength::new(0.6).unwrap())
    } else {
        (MatchClassification::NonMatch, Strength::new(0.0).unwrap_or_else(|_| unreachable!()))
    }
}

/// Scans the whole store for every `evaluate` call — adequate for the
/// corpus sizes a test fixture deals with, not for production scale.
#[derive(Debug, Clone)]
pub struct InMemoryMatcher {
    store: Arc<InMemoryStore>,
}

impl InMemoryMatcher {
    #[must_use]
    pub const fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Matcher for InMemoryMatcher {
    async fn evaluate(
        &self,
        record: &Record,
        configuration_id: &str,
        ignore: &IgnoreKeySet,
    ) -> Result<Vec<MatchResult>, MatcherFailure> {
        if configuration_id != IDENTITY_CONFIGURATION_ID {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for other in self.store.all_records() {
            if other.key == record.key || other.status != RecordStatus::Active {
                continue;
            }
            if ignore.contains(&other.key) || ignore.contains(&self.store.current_master_of(other.key)) {
                continue;
            }
            let (classification, strength) = classify(record, &other);
            if classification == MatchClassification::NonMatch {
                continue;
            }
            results.push(MatchResult {
                target: other.key,
                classification,
                strength,
            });
        }
        Ok(results)
    }

    async fn classify_against(
        &self,
        record: &Record,
        master_view: &Record,
        configuration_id: &str,
    ) -> Result<(MatchClassification, Strength), MatcherFailure> {
        if configuration_id != IDENTITY_CONFIGURATION_ID {
            #[expect(clippy::unwrap_used, reason = "0.0 is within Strength's valid range")]
            return Ok((MatchClassification::NonMatch, Strength::new(0.0).unwrap()));
        }
        Ok(classify(record, master_view))
    }
}

/// Holds a fixed list of configurations, defaulting to a single active
/// `$identity` configuration with `$mdm.auto-link` set for every model type
/// passed to [`Self::with_identity_config`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryMatchConfigurationService {
    configurations: Vec<MatchConfiguration>,
}

impl InMemoryMatchConfigurationService {
    #[must_use]
    pub fn with_identity_config(applicable_types: Vec<String>, auto_link: bool) -> Self {
        let mut tags = std::collections::HashMap::new();
        tags.insert(tags::MDM_AUTO_LINK.to_owned(), auto_link.to_string());
        Self {
            configurations: vec![MatchConfiguration {
                id: IDENTITY_CONFIGURATION_ID.to_owned(),
                applicable_types,
                status: ConfigurationStatus::Active,
                tags,
            }],
        }
    }

    pub fn push(&mut self, configuration: MatchConfiguration) {
        self.configurations.push(configuration);
    }
}

#[async_trait]
impl MatchConfigurationService for InMemoryMatchConfigurationService {
    async fn active_configurations(&self, model_type: &str) -> Result<Vec<MatchConfiguration>, MatcherFailure> {
        Ok(self
            .configurations
            .iter()
            .filter(|configuration| {
                configuration.status == ConfigurationStatus::Active
                    && (configuration.applicable_types.is_empty()
                        || configuration.applicable_types.iter().any(|applicable| applicable == model_type))
            })
            .cloned()
            .collect())
    }
}
