//! Engine-internal configuration. The match configurations themselves are
//! owned by the external configuration service (§6); what lives here is the
//! handful of behavioral toggles §9's open questions leave to implementers.

use std::{env, num::NonZeroUsize, str::FromStr};

/// How a MasterLink that moves the last LOCAL off a MASTER disposes of the
/// now-empty MASTER (§9, §4.2.2). `Replace` obsoletes the old MASTER with a
/// `Replaces` back-pointer (auditable, reversible); `Delete` removes it
/// outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlinkMode {
    #[default]
    Replace,
    Delete,
}

impl FromStr for UnlinkMode {
    type Err = UnlinkModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "replace" => Ok(Self::Replace),
            "delete" => Ok(Self::Delete),
            other => Err(UnlinkModeParseError(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{_0:?} is not a valid unlink mode, expected \"replace\" or \"delete\"")]
pub struct UnlinkModeParseError(#[error(not(source))] String);

/// Runtime configuration for the Data Manager (§9 open questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub master_unlink_mode: UnlinkMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_unlink_mode: UnlinkMode::Replace,
        }
    }
}

impl EngineConfig {
    /// Reads `MDM_MASTER_UNLINK_MODE` (`"replace"` | `"delete"`), falling
    /// back to the default when unset or unrecognized, in the texture of
    /// `DatabaseConnectionInfo`'s env-backed fields.
    #[must_use]
    pub fn from_env() -> Self {
        let master_unlink_mode = env::var("MDM_MASTER_UNLINK_MODE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        Self { master_unlink_mode }
    }
}

/// Runtime configuration for the Batch-Match job (§4.7, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMatchConfig {
    pub page_size: NonZeroUsize,
}

impl Default for BatchMatchConfig {
    #[expect(
        clippy::unwrap_used,
        reason = "100 is a non-zero literal, this can never fail"
    )]
    fn default() -> Self {
        Self {
            page_size: NonZeroUsize::new(100).unwrap(),
        }
    }
}

impl BatchMatchConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let page_size = env::var("MDM_BATCH_PAGE_SIZE")
            .ok()
            .and_then(|value| value.parse::<NonZeroUsize>().ok())
            .unwrap_or(Self::default().page_size);
        Self { page_size }
    }
}
