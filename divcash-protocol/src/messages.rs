//! Messages exchanged between the client, the bank, and the payee.
//!
//! Every message is a JSON object whose field names are fixed by the wire format. Protocol
//! integers travel as bare JSON numbers of arbitrary width. Amounts travel as signed integers
//! and are range-checked when a message is validated, never on decode.

use crate::{
    client::{ChangeRequest, PaymentReveal},
    Amount, Error, Exponent, PublicParameters,
};
use divcash_crypto::{BlindedMessage, BlindedSignature, RawValue, RevealedValue};
use num_bigint::BigUint;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::convert::TryFrom;
use tracing::debug;

/// Outcome flag carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The request was served.
    #[serde(rename = "ok")]
    Ok,
    /// The request was refused.
    #[serde(rename = "false")]
    Refused,
}

/// A blinded token, sent by the client to the bank for signing under `h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanknoteRequest {
    /// The blinded message `s1 * r1^h mod n`.
    #[serde(with = "crate::serde::decimal")]
    pub banknote: BlindedMessage,
}

/// The bank's answer to a [`BanknoteRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanknoteResponse {
    /// Whether the banknote was signed.
    pub status: Status,
    /// The blinded signature, present when `status` is `ok`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub signed_banknote: Option<BlindedSignature>,
}

impl BanknoteResponse {
    /// A successful response carrying `signature`.
    pub fn signed(signature: BlindedSignature) -> Self {
        Self {
            status: Status::Ok,
            signed_banknote: Some(signature),
        }
    }

    /// A refusal.
    pub fn refused() -> Self {
        Self {
            status: Status::Refused,
            signed_banknote: None,
        }
    }

    /// Extract the signature from a successful response.
    pub fn into_signature(self) -> Result<BlindedSignature, Error> {
        match (self.status, self.signed_banknote) {
            (Status::Ok, Some(signature)) => Ok(signature),
            (Status::Ok, None) => Err(Error::Malformed(
                "banknote response is missing signed_banknote".to_string(),
            )),
            (Status::Refused, _) => Err(Error::Verification("banknote request")),
        }
    }
}

/// A blinded change value, forwarded by the payee to the bank for signing under `change_exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSigningRequest {
    /// The blinded message `t * ra^change_exp mod n`.
    #[serde(with = "crate::serde::decimal")]
    pub blinded_change: BlindedMessage,
    /// The exponent encoding the change amount.
    #[serde(with = "crate::serde::decimal")]
    pub change_exp: Exponent,
}

/// The bank's answer to a [`ChangeSigningRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSigningResponse {
    /// Always `ok`; a refused request is reported as an error by the transport.
    pub status: Status,
    /// The blinded change signature.
    #[serde(with = "crate::serde::decimal")]
    pub signed_change_blinded: BlindedSignature,
}

/// An integer disclosed on the wire that carries no protocol meaning of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Disclosed(BigUint);

impl From<BigUint> for Disclosed {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl AsRef<BigUint> for Disclosed {
    fn as_ref(&self) -> &BigUint {
        &self.0
    }
}

/// A payment, sent by the client to the payee.
///
/// `s1` is the spent token's raw value. The change fields are present exactly when
/// `payment_amount < amount`. `t` and `ra` are accepted for compatibility and ignored; a client
/// should not send them, since they let the receiver link the change to this payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    /// The reveal `sig^payment_exp mod n`.
    #[serde(with = "crate::serde::decimal")]
    pub payment: RevealedValue,
    /// The raw value of the spent token.
    #[serde(with = "crate::serde::decimal")]
    pub s1: RawValue,
    /// The exponent encoding `payment_amount`.
    #[serde(with = "crate::serde::decimal")]
    pub payment_exp: Exponent,
    /// The amount paid.
    pub payment_amount: i64,
    /// The spending budget of the spent token.
    pub amount: i64,
    /// The change raw value. Ignored.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub t: Option<Disclosed>,
    /// The change blinding factor. Ignored.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub ra: Option<Disclosed>,
    /// The blinded change value, when change is owed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub blinded_change: Option<BlindedMessage>,
    /// The exponent encoding the change amount, when change is owed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub change_exp: Option<Exponent>,
}

fn wire_amount(amount: Amount) -> Result<i64, Error> {
    i64::try_from(amount.value()).map_err(|_| Error::OutOfRange {
        amount: i128::from(amount.value()),
        max: i64::MAX as u64,
    })
}

impl PaymentSubmission {
    /// Assemble a payment from the client's reveal and, on short payment, its change request.
    pub fn new(
        reveal: &PaymentReveal,
        raw_value: &RawValue,
        payment_amount: Amount,
        amount: Amount,
        change: Option<&ChangeRequest>,
    ) -> Result<Self, Error> {
        Ok(Self {
            payment: reveal.revealed_value.clone(),
            s1: raw_value.clone(),
            payment_exp: reveal.exponent.clone(),
            payment_amount: wire_amount(payment_amount)?,
            amount: wire_amount(amount)?,
            t: None,
            ra: None,
            blinded_change: change.map(|c| c.blinded_change.clone()),
            change_exp: change.map(|c| c.change_exp.clone()),
        })
    }

    /// Check the submission's amounts and exponents against the domain parameters.
    ///
    /// Both amounts must be representable with `payment_amount <= amount`. `payment_exp` must
    /// encode `payment_amount`. When change is owed, `blinded_change` and `change_exp` must be
    /// present and `change_exp` must encode `amount - payment_amount`; when none is owed they
    /// must be absent. The reveal itself is not checked here.
    pub fn validate(&self, params: &PublicParameters) -> Result<ValidatedPayment, Error> {
        let amount = params.amount(self.amount)?;
        let payment_amount = params.amount(self.payment_amount)?;
        let change_amount = amount
            .checked_sub(payment_amount)
            .ok_or(Error::OutOfRange {
                amount: i128::from(self.payment_amount),
                max: amount.value(),
            })?;

        if params.encode(payment_amount)? != self.payment_exp {
            return Err(Error::Malformed(
                "payment_exp does not encode payment_amount".to_string(),
            ));
        }

        if self.t.is_some() || self.ra.is_some() {
            debug!("ignoring disclosed change secrets in payment submission");
        }

        let change = match (&self.blinded_change, &self.change_exp) {
            (None, None) if change_amount.is_zero() => None,
            (Some(blinded_change), Some(change_exp)) if !change_amount.is_zero() => {
                if params.encode(change_amount)? != *change_exp {
                    return Err(Error::Malformed(
                        "change_exp does not encode the change amount".to_string(),
                    ));
                }
                Some(ChangeSigningRequest {
                    blinded_change: blinded_change.clone(),
                    change_exp: change_exp.clone(),
                })
            }
            _ if change_amount.is_zero() => {
                return Err(Error::Malformed(
                    "change fields present on a full payment".to_string(),
                ))
            }
            _ => {
                return Err(Error::Malformed(
                    "blinded_change and change_exp are required when change is owed".to_string(),
                ))
            }
        };

        Ok(ValidatedPayment {
            reveal: PaymentReveal {
                exponent: self.payment_exp.clone(),
                revealed_value: self.payment.clone(),
            },
            claimed: self.s1.clone(),
            amount,
            payment_amount,
            change_amount,
            change,
        })
    }
}

/// A [`PaymentSubmission`] whose amounts and exponents are consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayment {
    /// The payment reveal.
    pub reveal: PaymentReveal,
    /// The raw value the reveal is checked against.
    pub claimed: RawValue,
    /// The spending budget of the spent token.
    pub amount: Amount,
    /// The amount paid.
    pub payment_amount: Amount,
    /// The amount owed back.
    pub change_amount: Amount,
    /// The change to be signed, if any is owed.
    pub change: Option<ChangeSigningRequest>,
}

/// The payee's answer to a [`PaymentSubmission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    /// Whether the payment was accepted.
    pub status: Status,
    /// The blinded change signature, when change was owed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub signed_change_blinded: Option<BlindedSignature>,
    /// The change exponent, echoed back, when change was owed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::optional_decimal"
    )]
    pub change_exp: Option<Exponent>,
}

impl PaymentResponse {
    /// An acceptance, carrying the signed change if any was owed.
    pub fn accepted(change: Option<ChangeVerificationSubmission>) -> Self {
        match change {
            Some(change) => Self {
                status: Status::Ok,
                signed_change_blinded: Some(change.signed_change_blinded),
                change_exp: Some(change.change_exp),
            },
            None => Self {
                status: Status::Ok,
                signed_change_blinded: None,
                change_exp: None,
            },
        }
    }

    /// A rejection.
    pub fn rejected() -> Self {
        Self {
            status: Status::Refused,
            signed_change_blinded: None,
            change_exp: None,
        }
    }

    /// Whether the payment was accepted.
    pub fn is_accepted(&self) -> bool {
        self.status == Status::Ok
    }

    /// The signed change, if the response carries both change fields.
    pub fn change(&self) -> Option<ChangeVerificationSubmission> {
        match (&self.signed_change_blinded, &self.change_exp) {
            (Some(signed_change_blinded), Some(change_exp)) => Some(ChangeVerificationSubmission {
                signed_change_blinded: signed_change_blinded.clone(),
                change_exp: change_exp.clone(),
            }),
            _ => None,
        }
    }
}

/// Signed change returned to the client for unblinding and verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeVerificationSubmission {
    /// The blinded change signature.
    #[serde(with = "crate::serde::decimal")]
    pub signed_change_blinded: BlindedSignature,
    /// The exponent the change was signed under.
    #[serde(with = "crate::serde::decimal")]
    pub change_exp: Exponent,
}

/// Encode a message as JSON.
pub fn to_json<T: Serialize>(message: &T) -> Result<String, Error> {
    serde_json::to_string(message).map_err(|e| Error::Malformed(e.to_string()))
}

/// Decode a message from JSON.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, Error> {
    serde_json::from_str(json).map_err(|e| Error::Malformed(e.to_string()))
}
