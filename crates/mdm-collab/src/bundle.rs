use async_trait::async_trait;
use error_stack::Result;
use mdm_types::TxInstruction;

use crate::error::CommitFailure;

/// An ordered, in-progress set of storage instructions that will be
/// committed atomically (§3 "Bundle", §5 "assembling the full transaction in
/// memory before committing"). `Bundle` is the shared accumulator the Bundle
/// Interceptor (C7) threads through every per-item resource handler so all
/// of their instructions land in one transaction.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    instructions: Vec<TxInstruction>,
}

impl Bundle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    pub fn extend(&mut self, instructions: impl IntoIterator<Item = TxInstruction>) {
        self.instructions.extend(instructions);
    }

    pub fn push(&mut self, instruction: TxInstruction) {
        self.instructions.push(instruction);
    }

    #[must_use]
    pub fn into_instructions(self) -> Vec<TxInstruction> {
        self.instructions
    }

    #[must_use]
    pub fn instructions(&self) -> &[TxInstruction] {
        &self.instructions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Commits a totally-ordered sequence of items under a single transaction
/// and returns the persisted sequence with assigned keys (§6).
#[async_trait]
pub trait BundlePersister: Send + Sync {
    async fn commit(&self, bundle: Bundle) -> Result<Vec<TxInstruction>, CommitFailure>;
}
