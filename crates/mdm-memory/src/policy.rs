//! An in-memory [`PolicyEnforcement`] pair: one that allows everything (the
//! default test fixture) and one that denies a configured set of policies,
//! for exercising the escalation path in §7's error handling design.

use std::collections::HashSet;

use async_trait::async_trait;
use error_stack::Result;
use mdm_collab::{error::PermissionDenied, Policy, PolicyEnforcement};
use mdm_types::PrincipalId;

/// Grants every policy to every principal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

#[async_trait]
impl PolicyEnforcement for AllowAllPolicy {
    async fn demand(&self, _policy: Policy, _principal: &PrincipalId) -> Result<(), PermissionDenied> {
        Ok(())
    }
}

/// Denies a fixed set of policies regardless of principal, for tests that
/// exercise a permission-denied path.
#[derive(Debug, Default, Clone)]
pub struct DenyingPolicy {
    denied: HashSet<DenyKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DenyKey {
    WriteMaster,
    ReadMdmLocals,
    EditRecordOfTruth,
    EstablishRecordOfTruth,
    Merge,
}

const fn key_for(policy: Policy) -> DenyKey {
    match policy {
        Policy::WriteMaster => DenyKey::WriteMaster,
        Policy::ReadMdmLocals => DenyKey::ReadMdmLocals,
        Policy::EditRecordOfTruth => DenyKey::EditRecordOfTruth,
        Policy::EstablishRecordOfTruth => DenyKey::EstablishRecordOfTruth,
        Policy::Merge => DenyKey::Merge,
    }
}

impl DenyingPolicy {
    #[must_use]
    pub fn denying(policies: impl IntoIterator<Item = Policy>) -> Self {
        Self {
            denied: policies.into_iter().map(key_for).collect(),
        }
    }
}

#[async_trait]
impl PolicyEnforcement for DenyingPolicy {
    async fn demand(&self, policy: Policy, _principal: &PrincipalId) -> Result<(), PermissionDenied> {
        if self.denied.contains(&key_for(policy)) {
            Err(error_stack::Report::new(PermissionDenied))
        } else {
            Ok(())
        }
    }
}
