//! §4.2.6 Obsolete / Delete: retires a LOCAL, retiring its MASTER with it
//! when it was the last LOCAL attached.

use mdm_collab::error::PersistenceFailure;
use mdm_types::{BatchOperation, RecordKey, RecordStatus, TxInstruction};

use super::DataManager;

impl DataManager {
    /// §4.2.6: marks `local` Delete; if it was the only current LOCAL on
    /// its MASTER, marks the MASTER Delete too.
    pub async fn obsolete_local(
        &self,
        local: RecordKey,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, PersistenceFailure> {
        let mut out = Vec::new();

        let mut record = self.persistence.get_record(local).await?.ok_or(PersistenceFailure)?;

        if let Some(master_relationship) = self.current_master_relationship(local, context).await? {
            let master = master_relationship.target;
            let mut remaining = self.current_locals_of(master, context).await?;
            remaining.retain(|&key| key != local);
            if remaining.is_empty() {
                let mut master_record = self.persistence.get_record(master).await?.ok_or(PersistenceFailure)?;
                master_record.status = RecordStatus::Obsolete;
                out.push(TxInstruction::Record {
                    record: master_record,
                    operation: BatchOperation::Delete,
                });
            }
        }

        record.status = RecordStatus::Obsolete;
        out.push(TxInstruction::Record {
            record,
            operation: BatchOperation::Delete,
        });

        self.invalidate_cache(local);
        Ok(out)
    }
}
