//! §7 "Orphan-detected": a LOCAL with zero or many current `MasterRecord`
//! relationships is a formal-constraint violation worth surfacing, but it
//! is not itself an error. Modeled as a plain diagnostic value returned
//! alongside a successful call, rather than failing the whole operation
//! outright.

use mdm_types::RecordKey;

/// A formal-constraint violation detected during validation, reported to
/// the caller rather than raised as an [`crate::MdmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormalIssue {
    /// `local` currently has `current_master_count` current `MasterRecord`
    /// relationships, where the invariant requires exactly one.
    OrphanDetected {
        local: RecordKey,
        current_master_count: usize,
    },
}
