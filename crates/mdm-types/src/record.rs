use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    ids::{CreationSequence, RecordKey},
    principal::Provenance,
    relationship::Relationship,
};

/// A record's class: either the synthetic MASTER classification, or a real
/// domain class such as `"Patient"` (§3 deliberately leaves domain class
/// semantics to the caller — enforcing them is a non-goal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordClass {
    Master,
    Domain(String),
}

impl RecordClass {
    #[must_use]
    pub const fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Determiner {
    Normal,
    RecordOfTruth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordStatus {
    Active,
    Obsolete,
    Nullified,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub domain: String,
    pub value: String,
}

/// A curated demographic sub-object. Name/address/telecom/note content is
/// opaque free text to the engine — interpreting it is the matcher's job,
/// not ours (non-goal: domain-specific demographic semantics).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DemographicValue {
    /// Storage key for this sub-object, cleared by `clear_inner_keys`
    /// (§4.2.7) so persistence treats it as a fresh row.
    pub key: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub names: Vec<DemographicValue>,
    pub addresses: Vec<DemographicValue>,
    pub telecoms: Vec<DemographicValue>,
    pub notes: Vec<DemographicValue>,
    pub participations: Vec<DemographicValue>,
    pub language_communication: Vec<DemographicValue>,
}

impl Demographics {
    /// §4.2.7: clear inner keys of every demographic sub-object so the
    /// persister re-inserts them as fresh rows rather than trying to update
    /// rows that used to belong to a different owning record.
    pub fn clear_inner_keys(&mut self) {
        for value in self
            .names
            .iter_mut()
            .chain(self.addresses.iter_mut())
            .chain(self.telecoms.iter_mut())
            .chain(self.notes.iter_mut())
            .chain(self.participations.iter_mut())
            .chain(self.language_communication.iter_mut())
        {
            value.key = None;
        }
    }
}

/// A LOCAL submission, a MASTER projection, or a Record-of-Truth — the one
/// entity type the whole engine operates on (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub key: RecordKey,
    pub class: RecordClass,
    pub determiner: Determiner,
    pub status: RecordStatus,
    /// Assigned by the persistence layer on first commit; `None` on a
    /// record not yet persisted.
    pub creation_sequence: Option<CreationSequence>,
    pub identifiers: Vec<Identifier>,
    pub demographics: Demographics,
    /// Relationships embedded on the inbound object itself, before the
    /// Data Manager splits them out into standalone instructions
    /// (§4.2.1 step 3).
    pub relationships: Vec<Relationship>,
    pub tags: HashMap<String, String>,
    pub provenance: Provenance,
}

impl Record {
    #[must_use]
    pub fn new_local(class: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            key: RecordKey::new_generated(),
            class: RecordClass::Domain(class.into()),
            determiner: Determiner::Normal,
            status: RecordStatus::Active,
            creation_sequence: None,
            identifiers: Vec::new(),
            demographics: Demographics::default(),
            relationships: Vec::new(),
            tags: HashMap::new(),
            provenance,
        }
    }

    #[must_use]
    pub fn new_master(provenance: Provenance) -> Self {
        Self {
            key: RecordKey::new_generated(),
            class: RecordClass::Master,
            determiner: Determiner::Normal,
            status: RecordStatus::Active,
            creation_sequence: None,
            identifiers: Vec::new(),
            demographics: Demographics::default(),
            relationships: Vec::new(),
            tags: HashMap::new(),
            provenance,
        }
    }

    #[must_use]
    pub const fn is_master(&self) -> bool {
        self.class.is_master()
    }

    #[must_use]
    pub const fn is_record_of_truth(&self) -> bool {
        matches!(self.determiner, Determiner::RecordOfTruth)
    }

    /// §4.2.1 step 3: detach embedded MDM relationships so they can be
    /// re-emitted as standalone transaction instructions.
    #[must_use]
    pub fn take_relationships(&mut self) -> Vec<Relationship> {
        std::mem::take(&mut self.relationships)
    }
}
