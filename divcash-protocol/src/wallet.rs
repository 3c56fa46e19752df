//! A client wallet that runs whole exchanges against a bank and a payee.
//!
//! The wallet owns a [`TransactionBook`] and drives each record through purchase and payment.
//! Every failure, whether in a protocol step, in the transport, or in a counterpart's answer,
//! aborts the record it occurred in. Nothing is retried.

use crate::{
    client::{self, ChangeToken},
    messages::PaymentSubmission,
    transaction::{TransactionBook, TransactionId, TransactionRecord, TransactionStatus},
    transport::{BankConnection, PayeeConnection},
    Amount, Error, Rng,
};
use std::time::Duration;
use tracing::info;

/// The result of a finished payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// The transaction that paid.
    pub id: TransactionId,
    /// The amount paid.
    pub payment_amount: Amount,
    /// The change received, if any was owed.
    pub change: Option<ChangeToken>,
}

fn abort(record: &mut TransactionRecord, error: Error) -> Error {
    record.abort(&error);
    error
}

/// A client's wallet.
#[derive(Debug)]
pub struct Wallet<B: BankConnection, P: PayeeConnection> {
    config: client::Config,
    bank: B,
    payee: P,
    book: TransactionBook,
    change: Vec<ChangeToken>,
    funds: Option<Amount>,
    request_timeout: Option<Duration>,
}

impl<B: BankConnection, P: PayeeConnection> Wallet<B, P> {
    /// An empty wallet that reaches the bank and the payee through the given connections.
    pub fn new(config: client::Config, bank: B, payee: P) -> Self {
        Self {
            config,
            bank,
            payee,
            book: TransactionBook::new(),
            change: Vec::new(),
            funds: None,
            request_timeout: None,
        }
    }

    /// Limit purchases to `funds`, typically the balance of the client's bank account.
    ///
    /// Each purchase is paid for out of these funds. A wallet without funds set is not limited.
    pub fn with_funds(mut self, funds: Amount) -> Self {
        self.funds = Some(funds);
        self
    }

    /// Funds left for purchases, if the wallet is limited.
    pub fn funds(&self) -> Option<Amount> {
        self.funds
    }

    /// Abort any transaction whose counterpart takes longer than `timeout` to answer.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The wallet's transactions.
    pub fn book(&self) -> &TransactionBook {
        &self.book
    }

    /// Change tokens received so far.
    pub fn change_tokens(&self) -> &[ChangeToken] {
        &self.change
    }

    /// Purchase a token of `amount` from the bank.
    ///
    /// Returns the identifier of the new transaction, which is [`Issued`] on success and
    /// [`Aborted`] on any failure. A purchase beyond the wallet's funds is refused before any
    /// transaction is opened. Funds are only spent once the token is issued.
    ///
    /// [`Issued`]: TransactionStatus::Issued
    /// [`Aborted`]: TransactionStatus::Aborted
    pub fn purchase(&mut self, rng: &mut impl Rng, amount: Amount) -> Result<TransactionId, Error> {
        let remaining = match self.funds {
            Some(balance) => Some(balance.value().checked_sub(amount.value()).ok_or(
                Error::InsufficientFunds {
                    balance,
                    requested: amount,
                },
            )?),
            None => None,
        };

        let (bank, timeout) = (&self.bank, self.request_timeout);
        let id = self.book.open(self.config.clone(), amount);
        let record = self.book.get_mut(id)?;

        let request = record.begin(rng)?;
        let signed = bank
            .sign_banknote(&request, timeout)
            .map_err(|e| abort(record, e.into()))?
            .into_signature()
            .map_err(|e| abort(record, e))?;
        record.complete_token(signed)?;
        if let Some(remaining) = remaining {
            self.funds = Some(Amount::from(remaining));
        }

        info!(%id, %amount, "purchased token");
        Ok(id)
    }

    /**
    Pay `payment_amount` with the token of transaction `id`.

    On a short payment the change request travels with the payment, and the payee's answer must
    carry the bank's signature on it under the same exponent. The change token is kept in the
    wallet and returned in the [`PaymentOutcome`].
    */
    pub fn pay(
        &mut self,
        rng: &mut impl Rng,
        id: TransactionId,
        payment_amount: Amount,
    ) -> Result<PaymentOutcome, Error> {
        let (payee, timeout) = (&self.payee, self.request_timeout);
        let record = self.book.get_mut(id)?;
        let reveal = record.build_payment(payment_amount)?;
        let change_request = if payment_amount < record.amount() {
            Some(record.build_change_request(rng)?)
        } else {
            None
        };

        let raw_value = record
            .raw_value()
            .cloned()
            .ok_or_else(|| Error::InvalidState {
                expected: TransactionStatus::Issued,
                found: record.status(),
            })?;
        let submission = PaymentSubmission::new(
            &reveal,
            &raw_value,
            payment_amount,
            record.amount(),
            change_request.as_ref(),
        )
        .map_err(|e| abort(record, e))?;

        let response = payee
            .submit_payment(&submission, timeout)
            .map_err(|e| abort(record, e.into()))?;
        if !response.is_accepted() {
            return Err(abort(record, Error::Verification("payment")));
        }

        match (change_request, response.change()) {
            (Some(request), Some(signed)) if signed.change_exp == request.change_exp => {
                let _ = record.unblind_change(signed.signed_change_blinded)?;
            }
            (None, None) => {}
            (Some(_), _) => {
                let error = Error::Malformed("change not returned as requested".to_string());
                return Err(abort(record, error));
            }
            (None, Some(_)) => {
                let error = Error::Malformed("change returned on a full payment".to_string());
                return Err(abort(record, error));
            }
        }

        let change = record.complete()?.change().cloned();
        if let Some(token) = &change {
            self.change.push(token.clone());
        }
        info!(%id, %payment_amount, "payment completed");
        Ok(PaymentOutcome {
            id,
            payment_amount,
            change,
        })
    }
}
