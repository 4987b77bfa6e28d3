use crate::{record::Record, relationship::{BatchOperation, Relationship}};

/// One item of a committed MDM transaction: either a record or a
/// relationship, each carrying its own batch-operation tag (§3, §4.2's
/// "Output" line). Instructions are produced in the deterministic order
/// required by §5: deletions of old relationships first, then new records,
/// then new relationships, then dependent updates.
#[derive(Debug, Clone, PartialEq)]
pub enum TxInstruction {
    Record {
        record: Record,
        operation: BatchOperation,
    },
    Relationship(Relationship),
}

impl TxInstruction {
    #[must_use]
    pub const fn operation(&self) -> BatchOperation {
        match self {
            Self::Record { operation, .. } => *operation,
            Self::Relationship(relationship) => relationship.batch_operation,
        }
    }

    #[must_use]
    pub const fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Self::Relationship(relationship) => Some(relationship),
            Self::Record { .. } => None,
        }
    }

    #[must_use]
    pub fn as_relationship_mut(&mut self) -> Option<&mut Relationship> {
        match self {
            Self::Relationship(relationship) => Some(relationship),
            Self::Record { .. } => None,
        }
    }

    #[must_use]
    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record { record, .. } => Some(record),
            Self::Relationship(_) => None,
        }
    }
}

/// Ordering phase used to sequence a finished instruction list per §5:
/// delete-old-relationship, create-new-record, create-new-relationship,
/// dependent-update. Stable-sorting instructions by this key is how
/// `DataManager` methods guarantee the required commit order without
/// hand-threading positions through every branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommitPhase {
    DeleteOldRelationship,
    CreateNewRecord,
    CreateNewRelationship,
    DependentUpdate,
}

#[must_use]
pub fn commit_phase(instruction: &TxInstruction) -> CommitPhase {
    match instruction {
        TxInstruction::Record { operation, .. } if matches!(operation, BatchOperation::Insert) => {
            CommitPhase::CreateNewRecord
        }
        TxInstruction::Record { .. } => CommitPhase::DependentUpdate,
        TxInstruction::Relationship(relationship) => match relationship.batch_operation {
            BatchOperation::Delete => CommitPhase::DeleteOldRelationship,
            BatchOperation::Insert => CommitPhase::CreateNewRelationship,
            BatchOperation::Update | BatchOperation::InsertOrUpdate => {
                CommitPhase::DependentUpdate
            }
        },
    }
}
