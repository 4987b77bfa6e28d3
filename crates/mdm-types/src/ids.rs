use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque key identifying a single [`Record`](crate::record::Record).
///
/// Shared by MASTER and LOCAL records alike; whether a key names a MASTER
/// or a LOCAL is determined by the referenced record's class, never by the
/// key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(transparent))]
pub struct RecordKey(Uuid);

impl RecordKey {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn new_generated() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

/// Opaque key identifying a single [`Relationship`](crate::relationship::Relationship) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(transparent))]
pub struct RelationshipKey(Uuid);

impl RelationshipKey {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn new_generated() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

/// Monotonic marker recorded on a [`Relationship`](crate::relationship::Relationship) the moment
/// it stops being current. `None` on the relationship means "still current".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(transparent))]
pub struct ObsoletionSequence(u64);

impl ObsoletionSequence {
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic marker assigned to a [`Record`](crate::record::Record) by the
/// persistence layer the moment it is first committed. `RecordKey` carries
/// no temporal meaning (it wraps a random UUID), so this is what orders
/// LOCALs by actual creation time rather than by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(transparent))]
pub struct CreationSequence(u64);

impl CreationSequence {
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}
