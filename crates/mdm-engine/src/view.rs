//! C2: the Master View. A synthesized, read-only projection over one
//! MASTER and its attached LOCALs, computed once and cached on the struct —
//! a lazy read-through that re-projects on every *load*, not on every field
//! access (§9 "Synthesized views").

use std::collections::HashSet;

use mdm_types::{Identifier, Record};

/// Raw record or synthesized master view — the tagged variant §9 calls for
/// instead of special-casing MASTER records throughout the call chain.
#[derive(Debug, Clone)]
pub enum RecordView {
    Raw(Record),
    Master(EntityMaster),
}

impl RecordView {
    /// The single `Record` callers see, whichever variant this is.
    #[must_use]
    pub fn synthesize(&self) -> Record {
        match self {
            Self::Raw(record) => record.clone(),
            Self::Master(master) => master.synthesize(),
        }
    }
}

/// A MASTER plus the LOCALs and optional Record-of-Truth attached to it,
/// synthesized into one golden `Record` on demand (§4.1).
#[derive(Debug, Clone)]
pub struct EntityMaster {
    master: Record,
    locals: Vec<Record>,
    record_of_truth: Option<Record>,
    synthesized: Record,
}

impl EntityMaster {
    /// Builds the projection immediately; `locals` need not be pre-sorted,
    /// the deterministic creation-time-then-key ordering from §4.1 is
    /// applied here.
    #[must_use]
    pub fn new(master: Record, mut locals: Vec<Record>, record_of_truth: Option<Record>) -> Self {
        locals.sort_by_key(|local| (local.creation_sequence, local.key));
        let synthesized = Self::project(&master, &locals, record_of_truth.as_ref());
        Self {
            master,
            locals,
            record_of_truth,
            synthesized,
        }
    }

    #[must_use]
    pub const fn master(&self) -> &Record {
        &self.master
    }

    #[must_use]
    pub fn locals(&self) -> &[Record] {
        &self.locals
    }

    #[must_use]
    pub const fn record_of_truth(&self) -> Option<&Record> {
        self.record_of_truth.as_ref()
    }

    /// Re-synthesizes from the current master/locals/RoT state. Called by
    /// `new`; exposed so a caller that mutates the view in place (rare) can
    /// force a re-projection without rebuilding the whole struct.
    #[must_use]
    pub fn synthesize(&self) -> Record {
        self.synthesized.clone()
    }

    fn project(master: &Record, locals: &[Record], record_of_truth: Option<&Record>) -> Record {
        // Start from the RoT if present, else copy non-null demographic
        // fields from the most recent LOCALs in creation-time-then-key
        // order (§4.1). `locals` is already sorted ascending by
        // `creation_sequence` (falling back to key for locals persisted
        // before that field existed, or never committed).
        let mut projected = record_of_truth.cloned().unwrap_or_else(|| {
            let mut base = master.clone();
            for local in locals {
                if base.demographics.names.is_empty() {
                    base.demographics.names.clone_from(&local.demographics.names);
                }
                if base.demographics.addresses.is_empty() {
                    base.demographics
                        .addresses
                        .clone_from(&local.demographics.addresses);
                }
                if base.demographics.telecoms.is_empty() {
                    base.demographics
                        .telecoms
                        .clone_from(&local.demographics.telecoms);
                }
                if base.demographics.notes.is_empty() {
                    base.demographics.notes.clone_from(&local.demographics.notes);
                }
            }
            base
        });

        // Carry the MASTER's own identity so callers see the MASTER's key
        // and class, never the RoT's or a LOCAL's (§4.1).
        projected.key = master.key;
        projected.class = master.class.clone();

        // Merge identifiers from all LOCALs, deduplicated by (domain, value).
        let mut seen: HashSet<(String, String)> = projected
            .identifiers
            .iter()
            .map(|identifier| (identifier.domain.clone(), identifier.value.clone()))
            .collect();
        for local in locals {
            for identifier in &local.identifiers {
                let dedup_key = (identifier.domain.clone(), identifier.value.clone());
                if seen.insert(dedup_key) {
                    projected.identifiers.push(Identifier {
                        domain: identifier.domain.clone(),
                        value: identifier.value.clone(),
                    });
                }
            }
        }

        projected
    }
}
