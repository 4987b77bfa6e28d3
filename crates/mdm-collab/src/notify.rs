use mdm_types::RecordKey;

/// A repository lifecycle event the host exposes per type (§6). The engine
/// only cares about the subset a resource handler hooks: `Inserting`/
/// `Saving`/`Obsoleting` carry a cancel flag business-rule subscribers can
/// set; `Retrieving`/`Retrieved`/`Querying` do not commit anything and exist
/// so the Resource Interceptor / Query Synthesizer can rewrite the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryEventKind {
    Inserting,
    Saving,
    Obsoleting,
    Deleting,
}

/// Fired after a transaction establishing or removing a `MasterRecord`
/// relationship commits (§2 "fires link-established/link-removed
/// notifications").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkNotification {
    Established { local: RecordKey, master: RecordKey },
    Removed { local: RecordKey, master: RecordKey },
}

/// A cancellable notification fired around a merge/unmerge/ignore operation
/// (§4.5). Subscribers flip `cancel` to short-circuit the operation before
/// any Data Manager call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellableEvent<T> {
    pub payload: T,
    pub cancelled: bool,
}

impl<T> CancellableEvent<T> {
    #[must_use]
    pub const fn new(payload: T) -> Self {
        Self {
            payload,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// Sink for the notifications the engine fires. Implementations range from
/// a no-op (tests that don't care) to one that re-publishes to the host's
/// own repository-notification bus.
pub trait NotificationSink: Send + Sync {
    fn link_established(&self, local: RecordKey, master: RecordKey) {
        let _ = (local, master);
    }

    fn link_removed(&self, local: RecordKey, master: RecordKey) {
        let _ = (local, master);
    }
}

/// A sink that drops every notification, for tests and callers that don't
/// subscribe to link events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotificationSink;

impl NotificationSink for NullNotificationSink {}
