use async_trait::async_trait;
use error_stack::Result;
use mdm_types::PrincipalId;

use crate::error::PermissionDenied;

/// Well-known policy identifiers demanded throughout §4 (write-master,
/// read-mdm-locals, edit-RoT, establish-RoT). Kept as a closed enum rather
/// than a bare string so call sites can't typo a policy id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    WriteMaster,
    ReadMdmLocals,
    EditRecordOfTruth,
    EstablishRecordOfTruth,
    Merge,
}

/// `Demand(policyId, principal)` (§6): raises [`PermissionDenied`] if the
/// principal lacks the named permission. A denial is recoverable only by
/// escalation to an alternate path (§7) — the caller decides what that path
/// is, this trait only answers yes/no.
#[async_trait]
pub trait PolicyEnforcement: Send + Sync {
    async fn demand(&self, policy: Policy, principal: &PrincipalId) -> Result<(), PermissionDenied>;
}
