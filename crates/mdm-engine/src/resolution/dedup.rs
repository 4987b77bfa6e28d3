//! §4.2.1 step 9 / §9 "Graph churn reduction": a deterministic compaction
//! pass that collapses multiple MasterRecord/Candidate/OriginalMaster rows
//! aimed at the same target into at most one row per type, so the
//! underlying store never oscillates between insert/delete of the same
//! relationship across transactions.

use mdm_types::{RecordKey, Relationship, RelationshipType};

fn rank(relationship: &Relationship) -> (bool, u32) {
    let strength = relationship
        .strength
        .map_or(0, |strength| (strength.get() * 1000.0) as u32);
    (relationship.is_current(), strength)
}

/// Collapses `relationships` down to at most one current
/// `MasterRecord`/`Candidate`/`OriginalMaster` row per distinct
/// (source, target) pair, preferring current-over-obsolete and
/// stronger-over-weaker, then drops a current `Candidate` wherever a
/// current `MasterRecord` survives for the same pair (invariant 4: the two
/// can never both be current for the same pair). Keying on the full pair
/// rather than the target alone keeps this safe to run over a bundle that
/// mixes several distinct sources (the Merger's redirected relationships),
/// not just the single-source lists match-and-link produces.
#[must_use]
pub fn dedup_relationships_by_target(relationships: Vec<Relationship>) -> Vec<Relationship> {
    use std::collections::BTreeMap;

    let mut by_pair: BTreeMap<(RecordKey, RecordKey), Vec<Relationship>> = BTreeMap::new();
    let mut passthrough = Vec::new();

    for relationship in relationships {
        if matches!(
            relationship.relationship_type,
            RelationshipType::MasterRecord | RelationshipType::Candidate | RelationshipType::OriginalMaster
        ) {
            by_pair
                .entry((relationship.source, relationship.target))
                .or_default()
                .push(relationship);
        } else {
            passthrough.push(relationship);
        }
    }

    let mut out = Vec::new();
    for (_pair, mut rows) in by_pair {
        let mut best: BTreeMap<RelationshipTypeKey, Relationship> = BTreeMap::new();
        rows.sort_by(|a, b| rank(b).cmp(&rank(a)));
        for row in rows.drain(..) {
            let key = RelationshipTypeKey(row.relationship_type);
            best.entry(key).or_insert(row);
        }

        let has_current_master = best
            .get(&RelationshipTypeKey(RelationshipType::MasterRecord))
            .is_some_and(Relationship::is_current);

        for (key, relationship) in best {
            if key.0 == RelationshipType::Candidate && has_current_master && relationship.is_current() {
                // invariant 4: never a current MasterRecord and a current
                // Candidate to the same pair.
                continue;
            }
            out.push(relationship);
        }
    }

    out.extend(passthrough);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RelationshipTypeKey(RelationshipType);

impl RelationshipTypeKey {
    const fn discriminant(self) -> u8 {
        match self.0 {
            RelationshipType::MasterRecord => 0,
            RelationshipType::Candidate => 1,
            RelationshipType::IgnoreCandidate => 2,
            RelationshipType::MasterRecordOfTruth => 3,
            RelationshipType::OriginalMaster => 4,
            RelationshipType::Replaces => 5,
        }
    }
}

impl PartialOrd for RelationshipTypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelationshipTypeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.discriminant().cmp(&other.discriminant())
    }
}
