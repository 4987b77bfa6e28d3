//! Core data model for the MDM resolution engine: the `Record`/`Relationship`
//! graph, the well-known identifiers, and the tagged transaction instruction
//! that the Data Manager (in `mdm-engine`) produces for a bundle persister.

pub mod constants;
pub mod ids;
pub mod instruction;
pub mod principal;
pub mod record;
pub mod relationship;
pub mod tags;

pub use ids::{CreationSequence, ObsoletionSequence, RecordKey, RelationshipKey};
pub use instruction::{commit_phase, CommitPhase, TxInstruction};
pub use principal::{PrincipalId, PrincipalKind, Provenance};
pub use record::{Demographics, DemographicValue, Determiner, Identifier, Record, RecordClass, RecordStatus};
pub use relationship::{BatchOperation, Classification, Relationship, RelationshipType, Strength, StrengthOutOfRange};
