use serde::{Deserialize, Serialize};

/// Who submitted a LOCAL: an application acting on its own behalf, or a
/// specific device belonging to that application. Kept explicit rather than
/// an ambient "current user", per §9's "caller/application provenance" note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrincipalKind {
    Application,
    Device,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalId {
    pub kind: PrincipalKind,
    pub name: String,
}

impl PrincipalId {
    #[must_use]
    pub fn application(name: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::Application,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::Device,
            name: name.into(),
        }
    }
}

/// Who owns a LOCAL (§4.3 "caller's application/device"): the submitting
/// application, and optionally the specific device it submitted from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub application: PrincipalId,
    pub device: Option<PrincipalId>,
}

impl Provenance {
    #[must_use]
    pub fn owns(&self, caller: &PrincipalId) -> bool {
        &self.application == caller || self.device.as_ref() == Some(caller)
    }
}
