//! Errors raised while setting up or running a lift input session.

use crate::{channel, dealer::DealerError, role::Role};

/// A custom error type for secret-shared input processing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Both parties must agree on all public session parameters before sharing anything.
    #[error("configuration mismatch on {what}: local {local}, remote {remote}")]
    ConfigMismatch {
        /// The parameter the parties disagree on.
        what: &'static str,
        /// The value held by this party.
        local: String,
        /// The value announced by the other party.
        remote: String,
    },
    /// The parties issued operations in a different order or count.
    #[error("protocol desynchronized during '{phase}': expected {expected}, got {actual}")]
    Desync {
        /// The protocol phase during which the mismatch was detected.
        phase: String,
        /// The sequence number and phase the receiver expected.
        expected: String,
        /// The sequence number and phase found in the message.
        actual: String,
    },
    /// A message could not be sent or received.
    #[error(transparent)]
    Channel(channel::Error),
    /// The dealer aborted the session.
    #[error("dealer aborted the session: {0}")]
    Dealer(String),
    /// The local dealer task failed.
    #[error(transparent)]
    DealerTask(#[from] DealerError),
    /// The row collection is empty.
    #[error("the row collection must not be empty")]
    EmptyInput,
    /// A row carries data that belongs to the other party.
    #[error("row {row} carries data that the {role} does not own")]
    WrongRoleData {
        /// The role of the party that loaded the rows.
        role: Role,
        /// The index of the offending row.
        row: usize,
    },
    /// Two secret-shared vectors (or a vector and its declared length) have different lengths.
    #[error("length mismatch: expected {expected}, found {actual}")]
    LengthMismatch {
        /// The expected length.
        expected: usize,
        /// The actual length.
        actual: usize,
    },
    /// A party index that does not belong to either role.
    #[error("party {0} is neither the publisher nor the partner")]
    InvalidParty(usize),
    /// The plaintext values of an input were given to a party that does not own it.
    #[error("only the {owner} can provide plaintext values for this input")]
    NotInputOwner {
        /// The role owning the input.
        owner: Role,
    },
    /// A spawned party task panicked or was cancelled.
    #[error("party task failed: {0}")]
    TaskFailed(String),
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        match e.reason {
            channel::ErrorKind::OutOfOrder { expected, actual } => Error::Desync {
                phase: e.phase,
                expected: format!("#{} '{}'", expected.0, expected.1),
                actual: format!("#{} '{}'", actual.0, actual.1),
            },
            reason => Error::Channel(channel::Error {
                phase: e.phase,
                reason,
            }),
        }
    }
}
