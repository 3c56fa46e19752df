use crate::{transaction::TransactionStatus, transport::TransportError, Amount};
use thiserror::Error;

/// Specialisation of `std::Result`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of a protocol step.
///
/// Apart from [`Error::InvalidState`], every error ends the transaction it occurred in; there
/// is no resuming a partially-built token.
#[derive(Debug, Error)]
pub enum Error {
    /// An amount, payment, or change lies outside `[0, limit]`.
    #[error("amount {amount} is outside the permitted range 0..={max}")]
    OutOfRange {
        /// The rejected amount.
        amount: i128,
        /// The largest amount that would have been accepted.
        max: u64,
    },
    /// An exponent shares a factor with the bank's totient.
    #[error("exponent is not invertible modulo the totient")]
    NonInvertibleExponent,
    /// A counterpart's signature or reveal did not verify.
    #[error("{0} verification failed")]
    Verification(&'static str),
    /// A counterpart could not be reached or refused to answer.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A protocol step was attempted out of order.
    #[error("transaction is {found}, expected {expected}")]
    InvalidState {
        /// The state the step requires.
        expected: TransactionStatus,
        /// The state the transaction is in.
        found: TransactionStatus,
    },
    /// Change was requested on a payment of the full amount.
    #[error("no change is owed on this payment")]
    NoChangeOwed,
    /// A payment was finished while change was still owed.
    #[error("{0} in change is still owed")]
    ChangeOwed(Amount),
    /// No transaction with this identifier is on record.
    #[error("unknown transaction {0}")]
    UnknownTransaction(crate::transaction::TransactionId),
    /// A message from a counterpart was rejected at the boundary.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// A banknote face value outside the permitted set.
    #[error("denomination {0} is not permitted")]
    InvalidDenomination(u64),
    /// No banknote with this identifier is registered.
    #[error("unknown banknote {0}")]
    UnknownNote(u64),
    /// No account with this identifier is on record.
    #[error("unknown account {0}")]
    UnknownAccount(crate::accounts::AccountId),
    /// A withdrawal exceeds the funds available.
    #[error("requested {requested} but only {balance} is available")]
    InsufficientFunds {
        /// The funds available.
        balance: Amount,
        /// The amount requested.
        requested: Amount,
    },
    /// Configuration could not be read or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
    /// A stored token could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    /// Any other failure of the underlying primitives.
    #[error(transparent)]
    Crypto(divcash_crypto::Error),
}

impl From<divcash_crypto::Error> for Error {
    fn from(e: divcash_crypto::Error) -> Self {
        match e {
            divcash_crypto::Error::OutOfRange { amount, max } => Error::OutOfRange { amount, max },
            divcash_crypto::Error::NonInvertibleExponent => Error::NonInvertibleExponent,
            other => Error::Crypto(other),
        }
    }
}
