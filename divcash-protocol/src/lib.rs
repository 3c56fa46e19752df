/*!
This crate describes the divisible e-cash protocol built on the blind RSA-style primitives in
`divcash-crypto`. It defines the three roles and the per-token bookkeeping that threads them
together:

- the [`client`] (payer) blinds a token, unblinds the bank's signature, reveals a sub-value to a
  payee, and requests change for the remainder;
- the [`bank`] signs blinded tokens under the global exponent and change under a scoped one;
- the [`payee`] checks a payment reveal and drives the change exchange on short payment.

A [`TransactionRecord`](transaction::TransactionRecord) follows one token through

```text
Init -> Blinded -> Issued -> PaymentBuilt -> Completed
                                  |
                                  +-> ChangeRequested -> ChangeIssued -> Completed
```

and moves to `Aborted` on any failure. The [`wallet`] runs the whole exchange against a
[`BankConnection`](transport::BankConnection) and a
[`PayeeConnection`](transport::PayeeConnection).

Messages exchanged with counterparts are defined in [`messages`] and use the field names of the
JSON wire format.
*/
#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]
pub mod accounts;
pub mod bank;
pub mod client;
pub mod config;
pub mod messages;
pub mod notes;
pub mod payee;
pub mod transaction;
pub mod transport;
pub mod wallet;

mod error;
mod serde;

pub use divcash_crypto::{Amount, Exponent, KeyPair, PublicParameters, Rng};
pub use error::{Error, Result};

/// The result of a verification of some property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the result of a verification should always be checked"]
pub enum Verification {
    /// A verification succeeded.
    Verified,
    /// A verification failed.
    Failed,
}

impl Verification {
    /// Whether the verification succeeded.
    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }
}

impl From<bool> for Verification {
    fn from(b: bool) -> Self {
        if b {
            Verification::Verified
        } else {
            Verification::Failed
        }
    }
}
