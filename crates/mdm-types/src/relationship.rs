use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    constants,
    ids::{ObsoletionSequence, RecordKey, RelationshipKey},
};

/// Relationship kinds under MDM control, plus `Replaces`, which is only ever
/// used between two MASTERs (merge, §4.2.5) and is not itself one of the
/// five MDM-controlled types enumerated in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipType {
    MasterRecord,
    Candidate,
    IgnoreCandidate,
    MasterRecordOfTruth,
    OriginalMaster,
    Replaces,
}

impl RelationshipType {
    /// The bit-stable identifier from the well-known-identifiers table.
    /// `Replaces` has no externally published id; it is engine-internal.
    #[must_use]
    pub fn well_known_id(self) -> Option<Uuid> {
        Some(match self {
            Self::MasterRecord => constants::master_record(),
            Self::Candidate => constants::candidate(),
            Self::IgnoreCandidate => constants::ignore_candidate(),
            Self::MasterRecordOfTruth => constants::master_record_of_truth(),
            Self::OriginalMaster => constants::original_master(),
            Self::Replaces => return None,
        })
    }

    /// Whether this type is one of the five MDM-controlled relationship
    /// types named in §3, i.e. everything except `Replaces`.
    #[must_use]
    pub const fn is_mdm_controlled(self) -> bool {
        !matches!(self, Self::Replaces)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    System,
    Automagic,
    Verified,
}

impl Classification {
    #[must_use]
    pub fn well_known_id(self) -> Uuid {
        match self {
            Self::System => constants::system_classification(),
            Self::Automagic => constants::automagic_classification(),
            Self::Verified => constants::verified_classification(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchOperation {
    Insert,
    Update,
    Delete,
    InsertOrUpdate,
}

/// A match/classification strength, clamped to `[0.0, 1.0]` on construction
/// so nothing downstream has to re-validate it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Strength(f32);

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
#[display("strength must be within [0.0, 1.0], got {_0}")]
pub struct StrengthOutOfRange(#[error(not(source))] f32);

impl Strength {
    pub fn new(value: f32) -> Result<Self, StrengthOutOfRange> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(StrengthOutOfRange(value))
        }
    }

    #[must_use]
    pub const fn get(self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for Strength {
    type Error = StrengthOutOfRange;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Strength> for f32 {
    fn from(value: Strength) -> Self {
        value.0
    }
}

impl PartialOrd for Strength {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

/// A directed association between two records, typed and classified per §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub key: RelationshipKey,
    pub source: RecordKey,
    pub target: RecordKey,
    pub relationship_type: RelationshipType,
    pub classification: Classification,
    pub strength: Option<Strength>,
    pub obsoleted_at: Option<ObsoletionSequence>,
    pub batch_operation: BatchOperation,
}

impl Relationship {
    #[must_use]
    pub fn new(
        source: RecordKey,
        target: RecordKey,
        relationship_type: RelationshipType,
        classification: Classification,
        batch_operation: BatchOperation,
    ) -> Self {
        Self {
            key: RelationshipKey::new_generated(),
            source,
            target,
            relationship_type,
            classification,
            strength: None,
            obsoleted_at: None,
            batch_operation,
        }
    }

    #[must_use]
    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = Some(strength);
        self
    }

    #[must_use]
    pub fn with_strength_option(mut self, strength: Option<Strength>) -> Self {
        self.strength = strength;
        self
    }

    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.obsoleted_at.is_none()
    }

    /// Invariant 8: a relationship is never both obsoleted and marked
    /// `Delete` within the same transaction.
    #[must_use]
    pub const fn violates_delete_and_obsolete_invariant(&self) -> bool {
        matches!(self.batch_operation, BatchOperation::Delete) && self.obsoleted_at.is_some()
    }

    /// Marks this relationship as deleted in the current transaction,
    /// matching the "mark ... as Delete" language used throughout §4.2.
    pub fn mark_deleted(&mut self) {
        self.batch_operation = BatchOperation::Delete;
    }

    /// Same-pair-and-type identity, ignoring everything else — used by the
    /// §4.2.1 step 9 dedup pass.
    #[must_use]
    pub fn same_pair_and_type(&self, other: &Self) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.relationship_type == other.relationship_type
    }
}
