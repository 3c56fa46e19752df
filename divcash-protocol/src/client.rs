/*!
Cryptographic routines for obtaining, spending, and making change from a divisible token.

## Issue

The client begins in the [`Blinded`] state. Using an amount no larger than the alphabet allows,
they [`begin()`](Blinded::begin()) a token: a fresh raw value is blinded under the global
exponent `h` and sent to the bank as a [`BanknoteRequest`].

On receiving the bank's [`BlindedSignature`], the client [`complete()`](Blinded::complete())s
the token and enters the [`Issued`] state, holding a [`SignedToken`]. Completion checks the
unblinded signature against the raw value, so a bank that signs the wrong thing is caught
here rather than at the payee.

## Pay

From [`Issued`], the client [`pay()`](Issued::pay())s any amount up to the token's amount,
producing a [`PaymentReveal`] and entering [`PaymentBuilt`].

If the payment is the whole amount, the client [`finish()`](PaymentBuilt::finish())es. Otherwise
they [`request_change()`](PaymentBuilt::request_change()) for the remainder: a second raw value
is blinded under the exponent encoding the change amount, giving a [`ChangeRequest`] and the
[`ChangeRequested`] state. The bank's scoped signature is unblinded and checked by
[`complete()`](ChangeRequested::complete()), yielding [`ChangeIssued`] and a [`ChangeToken`].

Every transition consumes its state. A failed transition leaves nothing to retry: the blinding
factors are single-use.

The amount declared at [`begin()`](Blinded::begin()) is not bound into the issued token: every
token is issued under the full exponent, and the amount only bounds the later payment and
change split.
*/

use crate::{messages::BanknoteRequest, Amount, Error, Exponent, PublicParameters, Rng};
use divcash_crypto::{
    BlindedMessage, BlindedSignature, BlindingFactor, RawValue, RevealedValue, Signature,
};
use serde::*;
use std::sync::Arc;
use tracing::debug;

/// Parameters used throughout the lifetime of a client's tokens.
#[derive(Debug, Clone)]
pub struct Config {
    params: Arc<PublicParameters>,
}

impl Config {
    /// Wrap the published domain parameters.
    pub fn new(params: PublicParameters) -> Self {
        Self {
            params: Arc::new(params),
        }
    }

    /// Get the domain parameters.
    pub fn params(&self) -> &PublicParameters {
        &self.params
    }
}

/// A signed token: a raw value and the bank's unblinded signature on it under `h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedToken {
    raw_value: RawValue,
    signature: Signature,
}

impl SignedToken {
    /// The raw value the bank certified.
    pub fn raw_value(&self) -> &RawValue {
        &self.raw_value
    }

    /// The unblinded signature, `raw_value^(1/h) mod n`.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Encode for wallet storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from wallet storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A change token: a fresh raw value and the bank's unblinded signature under the change
/// exponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeToken {
    amount: Amount,
    exponent: Exponent,
    raw_value: RawValue,
    bill: Signature,
}

impl ChangeToken {
    /// The change amount.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The scoped exponent the change was issued under.
    pub fn exponent(&self) -> &Exponent {
        &self.exponent
    }

    /// The change raw value `t`.
    pub fn raw_value(&self) -> &RawValue {
        &self.raw_value
    }

    /// The unblinded change bill, `t^(1/change_exp) mod n`.
    pub fn bill(&self) -> &Signature {
        &self.bill
    }
}

/// Disclosed to a payee: a signature raised to the payment exponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReveal {
    /// Encoding of the payment amount.
    pub exponent: Exponent,
    /// `signature^exponent mod n`.
    pub revealed_value: RevealedValue,
}

/// A blinded request for change, scoped to the exponent encoding the change amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    /// The change amount.
    pub change_amount: Amount,
    /// Encoding of the change amount.
    pub change_exp: Exponent,
    /// `t * ra^change_exp mod n`.
    pub blinded_change: BlindedMessage,
}

/// A token that has been requested but not yet signed.
#[derive(Debug)]
pub struct Blinded {
    config: Config,
    amount: Amount,
    raw_value: RawValue,
    blinding_factor: BlindingFactor,
    blinded_message: BlindedMessage,
}

impl Blinded {
    /// Begin a new token for `amount`.
    ///
    /// Draws a raw value and a blinding factor from `[2, n-1]` and blinds the raw value under
    /// the global exponent `h`. Fails if `amount` is not representable.
    pub fn begin(
        rng: &mut impl Rng,
        config: &Config,
        amount: Amount,
    ) -> Result<(Self, BanknoteRequest), Error> {
        let params = config.params();
        let amount = params.check_amount(amount)?;

        let raw_value = RawValue::new(rng, params);
        let blinding_factor = BlindingFactor::new(rng, params)?;
        let h = Exponent::from(params.h().clone());
        let blinded_message = params.blind_message(&raw_value, &blinding_factor, &h);
        debug!(token = %raw_value.fingerprint(), %amount, "blinded new token");

        let request = BanknoteRequest {
            banknote: blinded_message.clone(),
        };
        Ok((
            Self {
                config: config.clone(),
                amount,
                raw_value,
                blinding_factor,
                blinded_message,
            },
            request,
        ))
    }

    /// The amount this token was requested for.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The raw value `s1`.
    pub fn raw_value(&self) -> &RawValue {
        &self.raw_value
    }

    /// The blinding factor `r1`.
    pub fn blinding_factor(&self) -> &BlindingFactor {
        &self.blinding_factor
    }

    /// The blinded message sent to the bank.
    pub fn blinded_message(&self) -> &BlindedMessage {
        &self.blinded_message
    }

    /// Complete issuance: unblind the bank's signature and check it against the raw value.
    pub fn complete(self, signed_blinded: BlindedSignature) -> Result<Issued, Error> {
        let params = self.config.params();
        let signature = signed_blinded.unblind(&self.blinding_factor, params);
        if !params.verify_signature(&signature, &self.raw_value) {
            return Err(Error::Verification("banknote signature"));
        }

        Ok(Issued {
            config: self.config,
            amount: self.amount,
            token: SignedToken {
                raw_value: self.raw_value,
                signature,
            },
        })
    }
}

/// A signed token ready to be spent.
#[derive(Debug)]
pub struct Issued {
    config: Config,
    amount: Amount,
    token: SignedToken,
}

impl Issued {
    /// The spending budget of this token.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The signed token.
    pub fn token(&self) -> &SignedToken {
        &self.token
    }

    /// Reveal `payment_amount` of this token to a payee.
    ///
    /// Fails if `payment_amount` exceeds the token's amount.
    pub fn pay(self, payment_amount: Amount) -> Result<(PaymentBuilt, PaymentReveal), Error> {
        if payment_amount > self.amount {
            return Err(Error::OutOfRange {
                amount: i128::from(payment_amount.value()),
                max: self.amount.value(),
            });
        }

        let params = self.config.params();
        let exponent = params.encode(payment_amount)?;
        let revealed_value = self.token.signature.reveal(&exponent, params);
        let reveal = PaymentReveal {
            exponent,
            revealed_value,
        };

        Ok((
            PaymentBuilt {
                config: self.config,
                amount: self.amount,
                payment_amount,
                payment_exp: reveal.exponent.clone(),
                token: self.token,
            },
            reveal,
        ))
    }
}

/// A token whose payment reveal has been built.
#[derive(Debug)]
pub struct PaymentBuilt {
    config: Config,
    amount: Amount,
    payment_amount: Amount,
    payment_exp: Exponent,
    token: SignedToken,
}

impl PaymentBuilt {
    /// The spending budget of this token.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The amount paid.
    pub fn payment_amount(&self) -> Amount {
        self.payment_amount
    }

    /// The exponent encoding the amount paid.
    pub fn payment_exp(&self) -> &Exponent {
        &self.payment_exp
    }

    /// The spent token.
    pub fn token(&self) -> &SignedToken {
        &self.token
    }

    /// The amount still owed back to the client.
    pub fn change_amount(&self) -> Amount {
        // pay() guarantees payment_amount <= amount
        self.amount
            .checked_sub(self.payment_amount)
            .unwrap_or(Amount::ZERO)
    }

    /// Request change for the unpaid remainder.
    ///
    /// Draws a fresh raw value `t` and blinding factor `ra` and blinds `t` under the exponent
    /// encoding the change amount.
    pub fn request_change(
        self,
        rng: &mut impl Rng,
    ) -> Result<(ChangeRequested, ChangeRequest), Error> {
        let change_amount = self.change_amount();
        if change_amount.is_zero() {
            return Err(Error::NoChangeOwed);
        }

        let params = self.config.params();
        let change_exp = params.encode(change_amount)?;
        let change_raw_value = RawValue::new(rng, params);
        let change_blinding_factor = BlindingFactor::new(rng, params)?;
        let blinded_change =
            params.blind_message(&change_raw_value, &change_blinding_factor, &change_exp);
        debug!(change = %change_raw_value.fingerprint(), %change_amount, "blinded change");

        let request = ChangeRequest {
            change_amount,
            change_exp: change_exp.clone(),
            blinded_change,
        };
        Ok((
            ChangeRequested {
                config: self.config,
                amount: self.amount,
                payment_amount: self.payment_amount,
                payment_exp: self.payment_exp,
                change_amount,
                change_exp,
                change_raw_value,
                change_blinding_factor,
            },
            request,
        ))
    }

    /// Finish a payment of the full amount.
    pub fn finish(self) -> Result<Completed, Error> {
        let change_amount = self.change_amount();
        if !change_amount.is_zero() {
            return Err(Error::ChangeOwed(change_amount));
        }
        Ok(Completed {
            amount: self.amount,
            payment_amount: self.payment_amount,
            change: None,
        })
    }
}

/// A payment waiting on the bank's signature over the change.
#[derive(Debug)]
pub struct ChangeRequested {
    config: Config,
    amount: Amount,
    payment_amount: Amount,
    payment_exp: Exponent,
    change_amount: Amount,
    change_exp: Exponent,
    change_raw_value: RawValue,
    change_blinding_factor: BlindingFactor,
}

impl ChangeRequested {
    /// The spending budget of the spent token.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The amount paid.
    pub fn payment_amount(&self) -> Amount {
        self.payment_amount
    }

    /// The exponent encoding the amount paid.
    pub fn payment_exp(&self) -> &Exponent {
        &self.payment_exp
    }

    /// The change amount.
    pub fn change_amount(&self) -> Amount {
        self.change_amount
    }

    /// The exponent encoding the change amount.
    pub fn change_exp(&self) -> &Exponent {
        &self.change_exp
    }

    /// The change raw value `t`.
    pub fn change_raw_value(&self) -> &RawValue {
        &self.change_raw_value
    }

    /// The change blinding factor `ra`.
    pub fn change_blinding_factor(&self) -> &BlindingFactor {
        &self.change_blinding_factor
    }

    /// Unblind the bank's scoped signature and check that it opens to `t` under the change
    /// exponent.
    pub fn complete(self, signed_change_blinded: BlindedSignature) -> Result<ChangeIssued, Error> {
        let params = self.config.params();
        let bill = signed_change_blinded.unblind(&self.change_blinding_factor, params);
        if !params.verify_change(&bill, &self.change_exp, &self.change_raw_value) {
            return Err(Error::Verification("change"));
        }

        Ok(ChangeIssued {
            amount: self.amount,
            payment_amount: self.payment_amount,
            payment_exp: self.payment_exp,
            change: ChangeToken {
                amount: self.change_amount,
                exponent: self.change_exp,
                raw_value: self.change_raw_value,
                bill,
            },
        })
    }
}

/// A payment whose change has been signed and checked.
#[derive(Debug)]
pub struct ChangeIssued {
    amount: Amount,
    payment_amount: Amount,
    payment_exp: Exponent,
    change: ChangeToken,
}

impl ChangeIssued {
    /// The spending budget of the spent token.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The amount paid.
    pub fn payment_amount(&self) -> Amount {
        self.payment_amount
    }

    /// The exponent encoding the amount paid.
    pub fn payment_exp(&self) -> &Exponent {
        &self.payment_exp
    }

    /// The change token.
    pub fn change(&self) -> &ChangeToken {
        &self.change
    }

    /// Finish the payment, keeping the change token.
    pub fn finish(self) -> Completed {
        Completed {
            amount: self.amount,
            payment_amount: self.payment_amount,
            change: Some(self.change),
        }
    }
}

/// The outcome of a finished payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    amount: Amount,
    payment_amount: Amount,
    change: Option<ChangeToken>,
}

impl Completed {
    /// The spending budget of the spent token.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// The amount paid.
    pub fn payment_amount(&self) -> Amount {
        self.payment_amount
    }

    /// The change received, if any was owed.
    pub fn change(&self) -> Option<&ChangeToken> {
        self.change.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use divcash_crypto::{BigUint, KeyPair};
    use rand::SeedableRng;

    fn rng() -> impl Rng {
        rand::rngs::StdRng::from_seed(*b"DON'T USE THIS FOR ANYTHING REAL")
    }

    fn toy() -> (KeyPair, Config) {
        let kp = KeyPair::new(vec![11, 13, 17], BigUint::from(7_u32), BigUint::from(11_u32))
            .unwrap();
        let config = Config::new(kp.public_parameters().clone());
        (kp, config)
    }

    fn issue(rng: &mut impl Rng, kp: &KeyPair, config: &Config, amount: u64) -> Issued {
        let (blinded, request) = Blinded::begin(rng, config, Amount::from(amount)).unwrap();
        blinded.complete(kp.blind_sign(&request.banknote)).unwrap()
    }

    #[test]
    fn begin_rejects_unrepresentable_amount() {
        let (_, config) = toy();
        assert!(matches!(
            Blinded::begin(&mut rng(), &config, Amount::from(8)),
            Err(Error::OutOfRange { amount: 8, max: 7 })
        ));
    }

    #[test]
    fn complete_rejects_forged_signature() {
        let mut rng = rng();
        let (kp, config) = toy();
        let (blinded, request) = Blinded::begin(&mut rng, &config, Amount::from(5)).unwrap();
        let honest = kp.blind_sign(&request.banknote);
        let forged = BlindedSignature::from((honest.as_biguint() + 1_u32) % 77_u32);
        assert!(matches!(
            blinded.complete(forged),
            Err(Error::Verification("banknote signature"))
        ));
    }

    #[test]
    fn overpayment_is_rejected() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 5);
        assert!(matches!(
            issued.pay(Amount::from(6)),
            Err(Error::OutOfRange { amount: 6, max: 5 })
        ));
    }

    #[test]
    fn full_payment_finishes_without_change() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 5);
        let (built, _) = issued.pay(Amount::from(5)).unwrap();
        assert_eq!(built.change_amount(), Amount::ZERO);
        let completed = built.finish().unwrap();
        assert!(completed.change().is_none());
    }

    #[test]
    fn full_payment_owes_no_change() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 5);
        let (built, _) = issued.pay(Amount::from(5)).unwrap();
        assert!(matches!(
            built.request_change(&mut rng),
            Err(Error::NoChangeOwed)
        ));
    }

    #[test]
    fn partial_payment_cannot_finish_without_change() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 5);
        let (built, _) = issued.pay(Amount::from(2)).unwrap();
        assert!(matches!(built.finish(), Err(Error::ChangeOwed(a)) if a == Amount::from(3)));
    }

    #[test]
    fn change_round_trip() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 7);
        let (built, reveal) = issued.pay(Amount::from(1)).unwrap();
        assert!(config
            .params()
            .verify_reveal(&reveal.revealed_value, &reveal.exponent, built.token().raw_value())
            .unwrap());

        let (requested, request) = built.request_change(&mut rng).unwrap();
        assert_eq!(request.change_amount, Amount::from(6));
        assert_eq!(request.change_exp, Exponent::from(BigUint::from(13_u32 * 17)));

        let signed = kp
            .blind_sign_scoped(&request.blinded_change, &request.change_exp)
            .unwrap();
        let completed = requested.complete(signed).unwrap().finish();
        let change = completed.change().unwrap();
        assert_eq!(change.amount(), Amount::from(6));
        assert!(config
            .params()
            .verify_change(change.bill(), change.exponent(), change.raw_value()));
    }

    #[test]
    fn tampered_change_is_rejected() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 7);
        let (built, _) = issued.pay(Amount::from(1)).unwrap();
        let (requested, request) = built.request_change(&mut rng).unwrap();
        let honest = kp
            .blind_sign_scoped(&request.blinded_change, &request.change_exp)
            .unwrap();
        let signed = BlindedSignature::from((honest.as_biguint() + 1_u32) % 77_u32);
        assert!(matches!(
            requested.complete(signed),
            Err(Error::Verification("change"))
        ));
    }

    #[test]
    fn signed_token_storage_round_trip() {
        let mut rng = rng();
        let (kp, config) = toy();
        let issued = issue(&mut rng, &kp, &config, 3);
        let bytes = issued.token().to_bytes().unwrap();
        assert_eq!(&SignedToken::from_bytes(&bytes).unwrap(), issued.token());
    }
}
