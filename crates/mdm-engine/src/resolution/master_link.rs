//! §4.2.2 Master-link (`MdmTxMasterLink`): attaches a LOCAL to a MASTER,
//! tearing down any prior `MasterRecord` relationship and, if that leaves
//! the old MASTER without any current LOCAL, either obsoleting it with a
//! `Replaces` back-pointer or deleting it outright, per [`UnlinkMode`].

use mdm_collab::error::PersistenceFailure;
use mdm_types::{
    BatchOperation, Classification, Relationship, RelationshipType, TxInstruction,
};

use super::DataManager;
use crate::config::UnlinkMode;

/// Normalized, order-independent arguments to master-link: whichever of the
/// caller's two keys names a MASTER becomes `master`, the other becomes
/// `local` (§4.2.2 "Normalize argument order").
pub struct MasterLinkArgs {
    pub master: mdm_types::RecordKey,
    pub local: mdm_types::RecordKey,
    pub verified: bool,
}

impl DataManager {
    /// Public entry point for §4.2.2: normalizes `a`/`b` into (master,
    /// local) order and runs [`Self::master_link`].
    pub async fn link(
        &self,
        a: mdm_types::RecordKey,
        b: mdm_types::RecordKey,
        verified: bool,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, mdm_collab::MdmError> {
        let args = self
            .normalize_master_link_args(a, b, verified, context)
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Precondition))?;
        self.master_link(&args, context)
            .await
            .map_err(|report| report.change_context(mdm_collab::MdmError::Persistence))
    }

    /// Normalizes `a`/`b` into (master, local) order, failing if both are
    /// masters or both are locals (§4.2.2).
    pub(crate) async fn normalize_master_link_args(
        &self,
        a: mdm_types::RecordKey,
        b: mdm_types::RecordKey,
        verified: bool,
        context: &[TxInstruction],
    ) -> error_stack::Result<MasterLinkArgs, mdm_collab::error::PreconditionViolated> {
        let a_is_master = self
            .resolve_is_master(a)
            .await
            .map_err(|report| report.change_context(mdm_collab::error::PreconditionViolated))?;
        let b_is_master = self
            .resolve_is_master(b)
            .await
            .map_err(|report| report.change_context(mdm_collab::error::PreconditionViolated))?;

        match (a_is_master, b_is_master) {
            (true, false) => Ok(MasterLinkArgs { master: a, local: b, verified }),
            (false, true) => Ok(MasterLinkArgs { master: b, local: a, verified }),
            _ => {
                let _ = context;
                Err(error_stack::Report::new(mdm_collab::error::PreconditionViolated)
                    .attach_printable("master-link requires exactly one master and one local key"))
            }
        }
    }

    async fn resolve_is_master(&self, key: mdm_types::RecordKey) -> error_stack::Result<bool, PersistenceFailure> {
        Ok(self
            .persistence
            .get_record(key)
            .await?
            .ok_or(PersistenceFailure)?
            .is_master())
    }

    /// Implements §4.2.2: attaches `args.local` to `args.master`, returning
    /// the instructions to append to the transaction. Does not itself run
    /// the dedup pass; callers fold this output through
    /// [`dedup_relationships_by_target`](super::dedup_relationships_by_target).
    pub(crate) async fn master_link(
        &self,
        args: &MasterLinkArgs,
        context: &[TxInstruction],
    ) -> error_stack::Result<Vec<TxInstruction>, mdm_collab::error::PersistenceFailure> {
        let mut out = Vec::new();

        let existing = self.current_master_relationship(args.local, context).await?;

        match existing {
            Some(mut relationship) if relationship.target == args.master => {
                if args.verified && relationship.classification == Classification::Automagic {
                    relationship.classification = Classification::Verified;
                    relationship.batch_operation = BatchOperation::Update;
                    out.push(TxInstruction::Relationship(relationship));
                }
                self.invalidate_cache(args.local);
                return Ok(out);
            }
            Some(mut old) => {
                let old_master = old.target;
                old.mark_deleted();
                out.push(TxInstruction::Relationship(old.clone()));

                if !args.verified {
                    out.push(TxInstruction::Relationship(Relationship::new(
                        args.local,
                        old_master,
                        RelationshipType::OriginalMaster,
                        Classification::System,
                        BatchOperation::Insert,
                    )));
                }

                let mut remaining = self.current_locals_of(old_master, context).await?;
                remaining.retain(|&key| key != args.local);
                if remaining.is_empty() {
                    out.extend(self.retire_emptied_master(args.master, old_master).await?);
                }
            }
            None => {}
        }

        // Delete any open Candidate(local -> master) before emitting the
        // link proper.
        let candidates = self
            .persistence
            .get_relationships(args.local, Some(RelationshipType::Candidate))
            .await?;
        for mut candidate in candidates {
            if candidate.target == args.master && candidate.is_current() {
                candidate.mark_deleted();
                out.push(TxInstruction::Relationship(candidate));
            }
        }

        let classification = if args.verified {
            Classification::Verified
        } else {
            Classification::System
        };
        out.push(TxInstruction::Relationship(Relationship::new(
            args.local,
            args.master,
            RelationshipType::MasterRecord,
            classification,
            BatchOperation::Insert,
        )));

        self.invalidate_cache(args.local);
        Ok(out)
    }

    /// §4.2.2/§9: a MASTER left with no current LOCAL after `new_master`
    /// absorbs its last LOCAL is either obsoleted with a
    /// `Replaces(new_master -> old_master)` back-pointer or deleted outright,
    /// per [`UnlinkMode`] (§9 open question, resolved in `DESIGN.md`:
    /// configurable, default `Replace`).
    pub(crate) async fn retire_emptied_master(
        &self,
        new_master: mdm_types::RecordKey,
        old_master: mdm_types::RecordKey,
    ) -> error_stack::Result<Vec<TxInstruction>, PersistenceFailure> {
        match self.config.master_unlink_mode {
            UnlinkMode::Delete => {
                let record = self.persistence.get_record(old_master).await?.ok_or(PersistenceFailure)?;
                Ok(vec![TxInstruction::Record {
                    record,
                    operation: BatchOperation::Delete,
                }])
            }
            UnlinkMode::Replace => {
                let mut record = self.persistence.get_record(old_master).await?.ok_or(PersistenceFailure)?;
                record.status = mdm_types::RecordStatus::Obsolete;
                Ok(vec![
                    TxInstruction::Record {
                        record,
                        operation: BatchOperation::Update,
                    },
                    TxInstruction::Relationship(Relationship::new(
                        new_master,
                        old_master,
                        RelationshipType::Replaces,
                        Classification::System,
                        BatchOperation::Insert,
                    )),
                ])
            }
        }
    }
}
