//! C7: the Bundle Interceptor. When a bundle persister receives a
//! transaction, this fans each item out to the matching Resource
//! Interceptor, threading one shared [`Bundle`] accumulator so every
//! handler's instructions land in the same transaction (§4.6).

use std::collections::HashMap;

use mdm_collab::bundle::{Bundle, BundlePersister};
use mdm_types::{commit_phase, BatchOperation, PrincipalId, Record, TxInstruction};

use crate::interceptor::{InterceptResult, ResourceInterceptor, SavingEvent};

/// One item of an inbound transaction, before the Bundle Interceptor
/// decides whether it is under MDM control.
pub struct BundleItem {
    pub record: Record,
    pub operation: BatchOperation,
    pub caller: PrincipalId,
}

/// Fans a `Bundle` out across the `ResourceInterceptor`s registered for the
/// model types under MDM control, keyed by model type the way
/// `ResourceInterceptor::model_type` names it. A type with no registered
/// handler passes through untouched — MDM only rewrites the types it has
/// been told to own.
pub struct BundleInterceptor {
    handlers: HashMap<String, ResourceInterceptor>,
}

impl BundleInterceptor {
    #[must_use]
    pub fn new(handlers: Vec<ResourceInterceptor>) -> Self {
        Self {
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.model_type().to_owned(), handler))
                .collect(),
        }
    }

    fn handler_for(&self, record: &Record) -> Option<&ResourceInterceptor> {
        match &record.class {
            mdm_types::RecordClass::Domain(model_type) => self.handlers.get(model_type),
            mdm_types::RecordClass::Master => None,
        }
    }

    /// §4.6: iterates `items`, invoking each MDM-controlled item's
    /// `on_saving`/`on_obsoleting` callback and accumulating every
    /// resulting instruction into one shared bundle. Items with no
    /// registered handler, or whose handler cancels, fall through into the
    /// passthrough bundle unchanged so the caller's own commit path can
    /// persist them — this is how cancellation propagates per §4.6: "a
    /// cancelled inner handler results in the bundle persister performing
    /// the commit itself ... rather than the host repository doing it
    /// twice".
    pub async fn dispatch(
        &self,
        items: Vec<BundleItem>,
    ) -> error_stack::Result<DispatchOutcome, mdm_collab::MdmError> {
        let mut committed = Vec::new();
        let mut passthrough = Bundle::new();

        for item in items {
            let Some(handler) = self.handler_for(&item.record) else {
                passthrough.push(TxInstruction::Record {
                    record: item.record,
                    operation: item.operation,
                });
                continue;
            };

            match item.operation {
                BatchOperation::Delete => {
                    let instructions = handler.on_obsoleting(item.record.key).await?;
                    committed.extend(instructions);
                }
                BatchOperation::Insert | BatchOperation::Update | BatchOperation::InsertOrUpdate => {
                    let event = mdm_collab::notify::CancellableEvent::new(SavingEvent {
                        record: item.record.clone(),
                        caller: item.caller,
                    });
                    match handler.on_saving(event).await? {
                        InterceptResult::Cancelled => {
                            passthrough.push(TxInstruction::Record {
                                record: item.record,
                                operation: item.operation,
                            });
                        }
                        InterceptResult::Committed { instructions } => committed.extend(instructions),
                    }
                }
            }
        }

        committed.sort_by_key(commit_phase);
        Ok(DispatchOutcome {
            committed,
            passthrough,
        })
    }
}

/// Result of fanning a transaction out across resource handlers: the
/// instructions already committed by MDM, and whatever items neither had a
/// handler nor were cancelled back to the caller.
pub struct DispatchOutcome {
    pub committed: Vec<TxInstruction>,
    pub passthrough: Bundle,
}

/// Convenience for a caller that wants to persist the passthrough bundle
/// itself once dispatch returns.
pub async fn commit_passthrough(
    persister: &dyn BundlePersister,
    outcome: DispatchOutcome,
) -> error_stack::Result<Vec<TxInstruction>, mdm_collab::error::CommitFailure> {
    if outcome.passthrough.is_empty() {
        return Ok(outcome.committed);
    }
    let mut persisted = persister.commit(outcome.passthrough).await?;
    persisted.extend(outcome.committed);
    Ok(persisted)
}
