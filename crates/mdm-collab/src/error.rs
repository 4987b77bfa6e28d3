//! The shared error vocabulary (§7), rendered the way `store/error.rs` does:
//! zero-sized marker structs carrying no payload of their own, with all
//! context attached by callers via `error_stack::Report::attach_printable`.

#[derive(Debug, Default, derive_more::Display, derive_more::Error)]
#[display("the persistence service encountered an error")]
#[must_use]
pub struct PersistenceFailure;

#[derive(Debug, Default, derive_more::Display, derive_more::Error)]
#[display("the bundle persister could not commit the transaction")]
#[must_use]
pub struct CommitFailure;

#[derive(Debug, Default, derive_more::Display, derive_more::Error)]
#[display("the matcher failed to evaluate candidates")]
#[must_use]
pub struct MatcherFailure;

#[derive(Debug, Default, derive_more::Display, derive_more::Error)]
#[display("the requested permission was denied")]
#[must_use]
pub struct PermissionDenied;

#[derive(Debug, Default, derive_more::Display, derive_more::Error)]
#[display("a precondition required by the operation was violated")]
#[must_use]
pub struct PreconditionViolated;

#[derive(Debug, Default, derive_more::Display, derive_more::Error)]
#[display("the operation was cancelled by an event subscriber")]
#[must_use]
pub struct EventCancelled;

/// Top-level failure kind the engine wraps every unrecoverable error into
/// before surfacing it to a caller (§7 "Propagation"). The underlying cause
/// rides along in the `error_stack::Report`'s attachment chain via
/// `change_context`; this enum just names the outermost kind so callers can
/// match on it without downcasting through the whole chain.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[must_use]
pub enum MdmError {
    #[display("the persistence service failed")]
    Persistence,
    #[display("the bundle persister could not commit")]
    Commit,
    #[display("the matcher failed")]
    Matcher,
    #[display("a required permission was denied")]
    Permission,
    #[display("a precondition was violated")]
    Precondition,
    #[display("the operation was cancelled")]
    Cancelled,
}
