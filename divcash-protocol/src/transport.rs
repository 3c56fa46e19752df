//! Connections to counterparts.
//!
//! The protocol roles are transport-agnostic: a client reaches the bank through a
//! [`BankConnection`] and a payee through a [`PayeeConnection`]. [`LocalBank`] and
//! [`LocalPayee`] serve requests in-process, passing every message through its JSON wire form.

use crate::{
    bank,
    messages::{
        self, BanknoteRequest, BanknoteResponse, ChangeSigningRequest, ChangeSigningResponse,
        PaymentResponse, PaymentSubmission,
    },
    payee::Payee,
    Error,
};
use crossbeam_channel::RecvTimeoutError;
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, thread, time::Duration};
use thiserror::Error;

/// Failure to obtain an answer from a counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The counterpart could not be reached.
    #[error("counterpart unreachable: {0}")]
    Unreachable(String),
    /// The counterpart did not answer in time.
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    /// The counterpart answered with a refusal.
    #[error("request refused: {0}")]
    Refused(String),
}

/// A connection to the bank.
///
/// Every call takes an optional deadline. A connection must give up with
/// [`TransportError::Timeout`] once it has passed instead of waiting on.
pub trait BankConnection {
    /// Ask the bank to sign a blinded token under `h`.
    fn sign_banknote(
        &self,
        request: &BanknoteRequest,
        timeout: Option<Duration>,
    ) -> Result<BanknoteResponse, TransportError>;

    /// Ask the bank to sign blinded change under a scoped exponent.
    fn sign_change(
        &self,
        request: &ChangeSigningRequest,
        timeout: Option<Duration>,
    ) -> Result<ChangeSigningResponse, TransportError>;
}

/// A connection to a payee.
pub trait PayeeConnection {
    /// Submit a payment and, on short payment, its change request.
    fn submit_payment(
        &self,
        submission: &PaymentSubmission,
        timeout: Option<Duration>,
    ) -> Result<PaymentResponse, TransportError>;
}

impl<T: BankConnection + ?Sized> BankConnection for Arc<T> {
    fn sign_banknote(
        &self,
        request: &BanknoteRequest,
        timeout: Option<Duration>,
    ) -> Result<BanknoteResponse, TransportError> {
        (**self).sign_banknote(request, timeout)
    }

    fn sign_change(
        &self,
        request: &ChangeSigningRequest,
        timeout: Option<Duration>,
    ) -> Result<ChangeSigningResponse, TransportError> {
        (**self).sign_change(request, timeout)
    }
}

impl<T: PayeeConnection + ?Sized> PayeeConnection for Arc<T> {
    fn submit_payment(
        &self,
        submission: &PaymentSubmission,
        timeout: Option<Duration>,
    ) -> Result<PaymentResponse, TransportError> {
        (**self).submit_payment(submission, timeout)
    }
}

/**
Run `call` on a worker thread and wait at most `timeout` for its answer.

Without a timeout the call runs on the current thread. A call that overruns is not interrupted:
it finishes in the background and its answer is dropped.
*/
pub fn call_within<T, F>(timeout: Option<Duration>, call: F) -> Result<T, TransportError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
{
    let timeout = match timeout {
        Some(timeout) => timeout,
        None => return call(),
    };
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let _worker = thread::spawn(move || {
        // Fails only once the caller has stopped waiting.
        let _ = sender.send(call());
    });
    match receiver.recv_timeout(timeout) {
        Ok(answer) => answer,
        Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(TransportError::Unreachable(
            "counterpart exited without answering".to_string(),
        )),
    }
}

fn refused(error: Error) -> TransportError {
    TransportError::Refused(error.to_string())
}

fn garbled(error: Error) -> TransportError {
    TransportError::Unreachable(error.to_string())
}

/// Serve `request` with `handler` within `timeout`, encoding and decoding both sides as the
/// wire would.
fn exchange<Req, Resp>(
    request: &Req,
    timeout: Option<Duration>,
    handler: impl FnOnce(Req) -> Result<Resp, Error> + Send + 'static,
) -> Result<Resp, TransportError>
where
    Req: Serialize + DeserializeOwned + 'static,
    Resp: Serialize + DeserializeOwned + 'static,
{
    let sent = messages::to_json(request).map_err(refused)?;
    let answer = call_within(timeout, move || {
        let received = messages::from_json(&sent).map_err(refused)?;
        let response = handler(received).map_err(refused)?;
        messages::to_json(&response).map_err(garbled)
    })?;
    messages::from_json(&answer).map_err(garbled)
}

/// An in-process bank.
#[derive(Debug, Clone)]
pub struct LocalBank {
    bank: Arc<bank::Config>,
}

impl LocalBank {
    /// Serve requests with `bank`.
    pub fn new(bank: Arc<bank::Config>) -> Self {
        Self { bank }
    }
}

impl BankConnection for LocalBank {
    fn sign_banknote(
        &self,
        request: &BanknoteRequest,
        timeout: Option<Duration>,
    ) -> Result<BanknoteResponse, TransportError> {
        let bank = self.bank.clone();
        exchange(request, timeout, move |request| Ok(bank.sign_banknote(&request)))
    }

    fn sign_change(
        &self,
        request: &ChangeSigningRequest,
        timeout: Option<Duration>,
    ) -> Result<ChangeSigningResponse, TransportError> {
        let bank = self.bank.clone();
        exchange(request, timeout, move |request| bank.sign_change(&request))
    }
}

/// An in-process payee.
#[derive(Debug)]
pub struct LocalPayee<B: BankConnection> {
    payee: Arc<Payee<B>>,
}

impl<B: BankConnection> LocalPayee<B> {
    /// Serve payments with `payee`.
    pub fn new(payee: Payee<B>) -> Self {
        Self {
            payee: Arc::new(payee),
        }
    }

    /// The payee behind this connection.
    pub fn payee(&self) -> &Payee<B> {
        &self.payee
    }
}

impl<B> PayeeConnection for LocalPayee<B>
where
    B: BankConnection + Send + Sync + 'static,
{
    fn submit_payment(
        &self,
        submission: &PaymentSubmission,
        timeout: Option<Duration>,
    ) -> Result<PaymentResponse, TransportError> {
        let payee = self.payee.clone();
        exchange(submission, timeout, move |submission| payee.accept(&submission))
    }
}
