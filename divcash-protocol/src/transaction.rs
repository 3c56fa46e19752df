/*!
Per-token bookkeeping.

A [`TransactionRecord`] follows one token from purchase to its final payment. It wraps the
[`client`](crate::client) typestates in a runtime state machine, so that a record can be stored,
looked up by [`TransactionId`], and advanced one step at a time.

Calling a step in the wrong state is reported as [`Error::InvalidState`] and leaves the record
untouched. Any failure of a step that is attempted moves the record to
[`TransactionStatus::Aborted`]: a partially built token is never resumed.
*/

use crate::{
    client::{
        self, Blinded, ChangeIssued, ChangeRequest, ChangeRequested, ChangeToken, Completed,
        Issued, PaymentBuilt, PaymentReveal, SignedToken,
    },
    messages::BanknoteRequest,
    Amount, Error, Exponent, Rng,
};
use divcash_crypto::{BlindedSignature, BlindingFactor, RawValue};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, mem};
use tracing::{debug, info, warn};

/// Identifier of a transaction, unique within a [`TransactionBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Where a transaction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Created, nothing sent yet.
    Init,
    /// Blinded request built, waiting on the bank.
    Blinded,
    /// Signed token held.
    Issued,
    /// Payment reveal built.
    PaymentBuilt,
    /// Change request built, waiting on the bank's scoped signature.
    ChangeRequested,
    /// Change signed and checked.
    ChangeIssued,
    /// Finished.
    Completed,
    /// Ended by a failure.
    Aborted,
}

impl TransactionStatus {
    /// Whether no further step is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Aborted)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Init => "init",
            TransactionStatus::Blinded => "blinded",
            TransactionStatus::Issued => "issued",
            TransactionStatus::PaymentBuilt => "payment-built",
            TransactionStatus::ChangeRequested => "change-requested",
            TransactionStatus::ChangeIssued => "change-issued",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
enum Stage {
    Init,
    Blinded(Blinded),
    Issued(Issued),
    PaymentBuilt(PaymentBuilt),
    ChangeRequested(ChangeRequested),
    ChangeIssued(ChangeIssued),
    Completed(Completed),
    Aborted(String),
}

impl Stage {
    fn status(&self) -> TransactionStatus {
        match self {
            Stage::Init => TransactionStatus::Init,
            Stage::Blinded(_) => TransactionStatus::Blinded,
            Stage::Issued(_) => TransactionStatus::Issued,
            Stage::PaymentBuilt(_) => TransactionStatus::PaymentBuilt,
            Stage::ChangeRequested(_) => TransactionStatus::ChangeRequested,
            Stage::ChangeIssued(_) => TransactionStatus::ChangeIssued,
            Stage::Completed(_) => TransactionStatus::Completed,
            Stage::Aborted(_) => TransactionStatus::Aborted,
        }
    }
}

/// The state of one token's purchase and payment.
///
/// Blinding factors are only held while they are still needed: `r1` until the token is
/// issued, `ra` until the change is issued.
#[derive(Debug)]
pub struct TransactionRecord {
    id: TransactionId,
    config: client::Config,
    amount: Amount,
    raw_value: Option<RawValue>,
    payment_amount: Option<Amount>,
    payment_exp: Option<Exponent>,
    change_amount: Option<Amount>,
    change_exp: Option<Exponent>,
    stage: Stage,
}

impl TransactionRecord {
    /// Open a record for a token of `amount`.
    pub fn new(id: TransactionId, config: client::Config, amount: Amount) -> Self {
        Self {
            id,
            config,
            amount,
            raw_value: None,
            payment_amount: None,
            payment_exp: None,
            change_amount: None,
            change_exp: None,
            stage: Stage::Init,
        }
    }

    /// The record's identifier.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The current status.
    pub fn status(&self) -> TransactionStatus {
        self.stage.status()
    }

    /// The spending budget of the token.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The token's raw value `s1`, once drawn.
    pub fn raw_value(&self) -> Option<&RawValue> {
        self.raw_value.as_ref()
    }

    /// The token's blinding factor `r1`, while the token is waiting on the bank.
    pub fn blinding_factor(&self) -> Option<&BlindingFactor> {
        match &self.stage {
            Stage::Blinded(blinded) => Some(blinded.blinding_factor()),
            _ => None,
        }
    }

    /// The issued token, once signed and until spent.
    pub fn token(&self) -> Option<&SignedToken> {
        match &self.stage {
            Stage::Issued(issued) => Some(issued.token()),
            Stage::PaymentBuilt(built) => Some(built.token()),
            _ => None,
        }
    }

    /// The amount paid, once the payment is built.
    pub fn payment_amount(&self) -> Option<Amount> {
        self.payment_amount
    }

    /// The exponent encoding the amount paid.
    pub fn payment_exp(&self) -> Option<&Exponent> {
        self.payment_exp.as_ref()
    }

    /// The change amount, once change is requested.
    pub fn change_amount(&self) -> Option<Amount> {
        self.change_amount
    }

    /// The exponent encoding the change amount.
    pub fn change_exp(&self) -> Option<&Exponent> {
        self.change_exp.as_ref()
    }

    /// The change raw value `t`, while change is outstanding or once issued.
    pub fn change_raw_value(&self) -> Option<&RawValue> {
        match &self.stage {
            Stage::ChangeRequested(requested) => Some(requested.change_raw_value()),
            _ => self.change().map(ChangeToken::raw_value),
        }
    }

    /// The change blinding factor `ra`, while change is waiting on the bank.
    pub fn change_blinding_factor(&self) -> Option<&BlindingFactor> {
        match &self.stage {
            Stage::ChangeRequested(requested) => Some(requested.change_blinding_factor()),
            _ => None,
        }
    }

    /// The change token, once issued.
    pub fn change(&self) -> Option<&ChangeToken> {
        match &self.stage {
            Stage::ChangeIssued(issued) => Some(issued.change()),
            Stage::Completed(completed) => completed.change(),
            _ => None,
        }
    }

    /// Why the record was aborted, if it was.
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.stage {
            Stage::Aborted(reason) => Some(reason),
            _ => None,
        }
    }

    fn check(&self, expected: TransactionStatus) -> Result<(), Error> {
        let found = self.status();
        if found == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { expected, found })
        }
    }

    /// Run one step from `expected`. The stage is taken out for the step and replaced by its
    /// successor, or by `Aborted` if the step fails.
    fn advance<T>(
        &mut self,
        expected: TransactionStatus,
        step: impl FnOnce(Stage) -> Result<(Stage, T), Error>,
    ) -> Result<T, Error> {
        self.check(expected)?;
        let stage = mem::replace(&mut self.stage, Stage::Aborted(String::new()));
        match step(stage) {
            Ok((next, output)) => {
                self.stage = next;
                info!(id = %self.id, from = %expected, to = %self.status(), "transaction advanced");
                Ok(output)
            }
            Err(error) => {
                warn!(id = %self.id, from = %expected, %error, "transaction aborted");
                self.stage = Stage::Aborted(error.to_string());
                Err(error)
            }
        }
    }

    fn mismatch(expected: TransactionStatus, found: &Stage) -> Error {
        Error::InvalidState {
            expected,
            found: found.status(),
        }
    }

    /// Draw the token's secrets and build the request for the bank.
    pub fn begin(&mut self, rng: &mut impl Rng) -> Result<BanknoteRequest, Error> {
        let config = self.config.clone();
        let amount = self.amount;
        let (request, raw_value) = self.advance(TransactionStatus::Init, |stage| match stage {
            Stage::Init => {
                let (blinded, request) = Blinded::begin(rng, &config, amount)?;
                let raw_value = blinded.raw_value().clone();
                Ok((Stage::Blinded(blinded), (request, raw_value)))
            }
            other => Err(Self::mismatch(TransactionStatus::Init, &other)),
        })?;
        self.raw_value = Some(raw_value);
        Ok(request)
    }

    /// Unblind and check the bank's signature on the token.
    pub fn complete_token(&mut self, signed: BlindedSignature) -> Result<(), Error> {
        self.advance(TransactionStatus::Blinded, |stage| match stage {
            Stage::Blinded(blinded) => Ok((Stage::Issued(blinded.complete(signed)?), ())),
            other => Err(Self::mismatch(TransactionStatus::Blinded, &other)),
        })
    }

    /// Build the reveal for a payment of `payment_amount`.
    pub fn build_payment(&mut self, payment_amount: Amount) -> Result<PaymentReveal, Error> {
        let reveal = self.advance(TransactionStatus::Issued, |stage| match stage {
            Stage::Issued(issued) => {
                let (built, reveal) = issued.pay(payment_amount)?;
                Ok((Stage::PaymentBuilt(built), reveal))
            }
            other => Err(Self::mismatch(TransactionStatus::Issued, &other)),
        })?;
        self.payment_amount = Some(payment_amount);
        self.payment_exp = Some(reveal.exponent.clone());
        Ok(reveal)
    }

    /// Build the blinded change request for the unpaid remainder.
    ///
    /// Fails with [`Error::NoChangeOwed`], leaving the record untouched, on a full payment.
    pub fn build_change_request(&mut self, rng: &mut impl Rng) -> Result<ChangeRequest, Error> {
        if let Stage::PaymentBuilt(built) = &self.stage {
            if built.change_amount().is_zero() {
                return Err(Error::NoChangeOwed);
            }
        }
        let request = self.advance(TransactionStatus::PaymentBuilt, |stage| match stage {
            Stage::PaymentBuilt(built) => {
                let (requested, request) = built.request_change(rng)?;
                Ok((Stage::ChangeRequested(requested), request))
            }
            other => Err(Self::mismatch(TransactionStatus::PaymentBuilt, &other)),
        })?;
        self.change_amount = Some(request.change_amount);
        self.change_exp = Some(request.change_exp.clone());
        Ok(request)
    }

    /// Unblind and check the bank's scoped signature on the change.
    pub fn unblind_change(&mut self, signed: BlindedSignature) -> Result<&ChangeToken, Error> {
        self.advance(TransactionStatus::ChangeRequested, |stage| match stage {
            Stage::ChangeRequested(requested) => {
                Ok((Stage::ChangeIssued(requested.complete(signed)?), ()))
            }
            other => Err(Self::mismatch(TransactionStatus::ChangeRequested, &other)),
        })?;
        self.change().ok_or(Error::InvalidState {
            expected: TransactionStatus::ChangeIssued,
            found: self.status(),
        })
    }

    /// Finish the transaction, after a full payment or once change is issued.
    ///
    /// Fails with [`Error::ChangeOwed`], leaving the record untouched, on a short payment whose
    /// change has not been issued.
    pub fn complete(&mut self) -> Result<&Completed, Error> {
        let expected = match &self.stage {
            Stage::ChangeIssued(_) => TransactionStatus::ChangeIssued,
            Stage::PaymentBuilt(built) if !built.change_amount().is_zero() => {
                return Err(Error::ChangeOwed(built.change_amount()))
            }
            _ => TransactionStatus::PaymentBuilt,
        };
        self.advance(expected, |stage| match stage {
            Stage::PaymentBuilt(built) => Ok((Stage::Completed(built.finish()?), ())),
            Stage::ChangeIssued(issued) => Ok((Stage::Completed(issued.finish()), ())),
            other => Err(Self::mismatch(expected, &other)),
        })?;
        match &self.stage {
            Stage::Completed(completed) => Ok(completed),
            other => Err(Self::mismatch(TransactionStatus::Completed, other)),
        }
    }

    /// Abort the transaction after a failure outside the record, such as a transport error.
    ///
    /// Has no effect on a record that is already completed or aborted.
    pub fn abort(&mut self, reason: &Error) {
        let status = self.status();
        if status.is_terminal() {
            debug!(id = %self.id, %status, "ignoring abort of finished transaction");
            return;
        }
        warn!(id = %self.id, from = %status, error = %reason, "transaction aborted");
        self.stage = Stage::Aborted(reason.to_string());
    }
}

/// All of a client's transactions, by identifier.
#[derive(Debug, Default)]
pub struct TransactionBook {
    records: HashMap<TransactionId, TransactionRecord>,
    next_id: u64,
}

impl TransactionBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new record for a token of `amount`.
    pub fn open(&mut self, config: client::Config, amount: Amount) -> TransactionId {
        let id = TransactionId(self.next_id);
        self.next_id += 1;
        let _ = self
            .records
            .insert(id, TransactionRecord::new(id, config, amount));
        debug!(%id, %amount, "opened transaction");
        id
    }

    /// Look up a record.
    pub fn get(&self, id: TransactionId) -> Result<&TransactionRecord, Error> {
        self.records.get(&id).ok_or(Error::UnknownTransaction(id))
    }

    /// Look up a record for advancing.
    pub fn get_mut(&mut self, id: TransactionId) -> Result<&mut TransactionRecord, Error> {
        self.records
            .get_mut(&id)
            .ok_or(Error::UnknownTransaction(id))
    }

    /// Remove a record from the book.
    pub fn remove(&mut self, id: TransactionId) -> Result<TransactionRecord, Error> {
        self.records
            .remove(&id)
            .ok_or(Error::UnknownTransaction(id))
    }

    /// Remove and return every completed or aborted record.
    pub fn archive_finished(&mut self) -> Vec<TransactionRecord> {
        let finished: Vec<_> = self
            .records
            .iter()
            .filter(|(_, record)| record.status().is_terminal())
            .map(|(id, _)| *id)
            .collect();
        let mut archived: Vec<_> = finished
            .into_iter()
            .filter_map(|id| self.records.remove(&id))
            .collect();
        archived.sort_by_key(TransactionRecord::id);
        archived
    }

    /// Identifiers of the records in `status`, in the order they were opened.
    pub fn with_status(&self, status: TransactionStatus) -> Vec<TransactionId> {
        let mut ids: Vec<_> = self
            .records
            .values()
            .filter(|record| record.status() == status)
            .map(TransactionRecord::id)
            .collect();
        ids.sort();
        ids
    }

    /// The number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the book holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
