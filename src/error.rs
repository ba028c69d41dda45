//! Error types for the dues ledger.
//!
//! Every error is fatal to a replay run: the event log is a curated source
//! of truth, so any inconsistency is a data-entry problem to fix at the
//! source rather than patch around during replay.

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can abort a replay run.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to open or read the input, or write the snapshot
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A log line does not parse into a well-formed event
    #[error("malformed event line `{line}`: {reason}")]
    EventParse { line: String, reason: String },

    /// Event kind not present in the dispatch table
    #[error("unknown event kind `{0}`")]
    UnknownEventKind(String),

    /// A handler required a member that was never registered
    #[error("member `{0}` not found")]
    MemberNotFound(String),

    /// `newMember` for an email that is already registered
    #[error("member `{0}` is already registered")]
    DuplicateMember(String),

    /// A handler received the wrong argument count or an unparseable value
    #[error("invalid arguments for `{kind}`: {message}")]
    InvalidArgs { kind: String, message: String },

    /// A dues rate of zero or less would be divided by
    #[error("dues rate {rate} for `{email}` is not positive")]
    InvalidRate { email: String, rate: String },

    /// An assertion event found state that does not match expectations
    #[error("assertion failed: {message} (comment: {comment})")]
    AssertionFailed { message: String, comment: String },

    /// Wraps any of the above with the failing event's original encoded form
    #[error("event `{event}` failed: {source}")]
    Event {
        event: String,
        #[source]
        source: Box<LedgerError>,
    },

    /// Bad CLI usage
    #[error("{0}. Usage: dues-ledger [-if <path|->] [-of <path|->]")]
    Usage(String),
}

impl LedgerError {
    /// Attaches the encoded form of the failing event.
    pub fn in_event(self, encoded: String) -> LedgerError {
        LedgerError::Event {
            event: encoded,
            source: Box::new(self),
        }
    }
}
