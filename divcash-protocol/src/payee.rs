//! Routines for the payee: verifying payment reveals and driving the change exchange.
//!
//! A payee checks a reveal with the complementary-exponent identity: raising
//! `sig^payment_exp` to `h / payment_exp` must give back the claimed raw value. On a short
//! payment it forwards the client's blinded change to the bank and hands the bank's blinded
//! signature back to the client.

use crate::{
    messages::{ChangeVerificationSubmission, PaymentResponse, PaymentSubmission, Status},
    transport::BankConnection,
    Amount, Error, Exponent, PublicParameters, Verification,
};
use divcash_crypto::{RawValue, RevealedValue, Signature};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{info, warn};

/// Parameters a payee verifies against.
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

    /// Check a payment reveal against the claimed raw value.
    ///
    /// A `payment_exp` that does not divide `h` fails verification.
    pub fn verify_payment(
        &self,
        revealed: &RevealedValue,
        payment_exp: &Exponent,
        claimed: &RawValue,
    ) -> Verification {
        self.params
            .verify_reveal(revealed, payment_exp, claimed)
            .unwrap_or(false)
            .into()
    }

    /// Check a change bill against its raw value.
    pub fn verify_change(
        &self,
        bill: &Signature,
        change_exp: &Exponent,
        claimed: &RawValue,
    ) -> Verification {
        self.params.verify_change(bill, change_exp, claimed).into()
    }
}

/// A payee that accepts payments and relays change requests to a bank.
#[derive(Debug)]
pub struct Payee<B: BankConnection> {
    config: Config,
    bank: B,
    bank_timeout: Option<Duration>,
    received: AtomicU64,
}

impl<B: BankConnection> Payee<B> {
    /// Instantiate a payee that reaches the bank through `bank`.
    pub fn new(config: Config, bank: B) -> Self {
        Self {
            config,
            bank,
            bank_timeout: None,
            received: AtomicU64::new(0),
        }
    }

    /// Give up on the bank, and fail the payment, if change signing takes longer than `timeout`.
    pub fn with_bank_timeout(mut self, timeout: Duration) -> Self {
        self.bank_timeout = Some(timeout);
        self
    }

    /// The payee's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The total value of accepted payments.
    pub fn received(&self) -> Amount {
        Amount::from(self.received.load(Ordering::SeqCst))
    }

    /**
    Accept or reject a payment.

    The submission is validated first: malformed amounts or exponents are errors. A reveal that
    fails verification is answered with a rejection. When change is owed, the blinded change is
    forwarded to the bank, and a bank failure fails the whole payment: nothing is credited.
    */
    pub fn accept(&self, submission: &PaymentSubmission) -> Result<PaymentResponse, Error> {
        let payment = submission.validate(self.config.params())?;

        if !self
            .config
            .verify_payment(
                &payment.reveal.revealed_value,
                &payment.reveal.exponent,
                &payment.claimed,
            )
            .is_verified()
        {
            warn!(payment = %payment.payment_amount, "rejected payment reveal");
            return Ok(PaymentResponse::rejected());
        }

        let paid = payment.payment_amount;
        let change = match &payment.change {
            Some(request) => {
                let response = self.bank.sign_change(request, self.bank_timeout)?;
                if response.status != Status::Ok {
                    return Err(Error::Verification("change signing"));
                }
                Some(ChangeVerificationSubmission {
                    signed_change_blinded: response.signed_change_blinded,
                    change_exp: request.change_exp.clone(),
                })
            }
            None => None,
        };

        // Saturate rather than wrap; retry if another payment was credited in between.
        let mut seen = self.received.load(Ordering::SeqCst);
        let total = loop {
            let credited = seen.saturating_add(paid.value());
            match self.received.compare_exchange_weak(
                seen,
                credited,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break credited,
                Err(current) => seen = current,
            }
        };
        info!(
            payment = %paid,
            change = %payment.change_amount,
            total,
            "accepted payment"
        );
        Ok(PaymentResponse::accepted(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bank,
        client::{ChangeRequest, PaymentReveal},
        messages::{BanknoteRequest, BanknoteResponse, ChangeSigningRequest, ChangeSigningResponse},
        transport::{LocalBank, TransportError},
        KeyPair,
    };
    use divcash_crypto::{BigUint, BlindedMessage};

    fn int(n: u32) -> BigUint {
        BigUint::from(n)
    }

    fn config() -> Config {
        Config::new(PublicParameters::new(int(77), vec![11, 13, 17]).unwrap())
    }

    // Signature 4 on raw value 4 under h = 2431 with d = 31 and n = 77.
    #[test]
    fn verifies_a_payment_of_one() {
        let config = config();
        let signature = Signature::from(int(4));
        let payment_exp = Exponent::from(int(11));
        let revealed = signature.reveal(&payment_exp, config.params());
        assert_eq!(
            config.verify_payment(&revealed, &payment_exp, &RawValue::from(int(4))),
            Verification::Verified
        );
    }

    #[test]
    fn rejects_an_overstated_payment() {
        let config = config();
        // Reveal made for amount 1 but claimed for amount 3.
        let revealed = Signature::from(int(4)).reveal(&Exponent::from(int(11)), config.params());
        let overstated = Exponent::from(int(11 * 13));
        assert_eq!(
            config.verify_payment(&revealed, &overstated, &RawValue::from(int(4))),
            Verification::Failed
        );
    }

    #[test]
    fn foreign_exponent_fails_verification() {
        let config = config();
        assert_eq!(
            config.verify_payment(
                &RevealedValue::from(int(4)),
                &Exponent::from(int(3)),
                &RawValue::from(int(4))
            ),
            Verification::Failed
        );
    }

    #[test]
    fn verifies_change_bills() {
        let config = config();
        let exp = Exponent::from(int(13));
        // 9^13 mod 77
        let t = RawValue::from(int(9).modpow(&int(13), &int(77)));
        assert!(config
            .verify_change(&Signature::from(int(9)), &exp, &t)
            .is_verified());
        assert!(!config
            .verify_change(&Signature::from(int(10)), &exp, &t)
            .is_verified());
    }

    fn payee_with<B: BankConnection>(bank: B) -> Payee<B> {
        Payee::new(config(), bank)
    }

    fn toy_bank() -> LocalBank {
        let keypair = KeyPair::new(vec![11, 13, 17], int(7), int(11)).unwrap();
        LocalBank::new(Arc::new(bank::Config::new(keypair)))
    }

    // Spends the toy token (raw value 4, signature 4) worth 3.
    fn spend(payment: u64, change: Option<&ChangeRequest>) -> PaymentSubmission {
        let params = config().params().clone();
        let exponent = params.encode(Amount::from(payment)).unwrap();
        let reveal = PaymentReveal {
            revealed_value: Signature::from(int(4)).reveal(&exponent, &params),
            exponent,
        };
        PaymentSubmission::new(
            &reveal,
            &RawValue::from(int(4)),
            Amount::from(payment),
            Amount::from(3),
            change,
        )
        .unwrap()
    }

    fn change_of_two() -> ChangeRequest {
        ChangeRequest {
            change_amount: Amount::from(2),
            change_exp: Exponent::from(int(13)),
            blinded_change: BlindedMessage::from(int(16)),
        }
    }

    #[derive(Debug)]
    struct DownBank;

    impl BankConnection for DownBank {
        fn sign_banknote(
            &self,
            _: &BanknoteRequest,
            _: Option<Duration>,
        ) -> Result<BanknoteResponse, TransportError> {
            Err(TransportError::Unreachable("down".to_string()))
        }

        fn sign_change(
            &self,
            _: &ChangeSigningRequest,
            _: Option<Duration>,
        ) -> Result<ChangeSigningResponse, TransportError> {
            Err(TransportError::Unreachable("down".to_string()))
        }
    }

    #[test]
    fn accepts_a_full_payment() {
        let payee = payee_with(toy_bank());
        let response = payee.accept(&spend(3, None)).unwrap();
        assert!(response.is_accepted());
        assert!(response.change().is_none());
        assert_eq!(payee.received(), Amount::from(3));
    }

    #[test]
    fn relays_change_to_the_bank() {
        let payee = payee_with(toy_bank());
        let response = payee.accept(&spend(1, Some(&change_of_two()))).unwrap();
        let change = response.change().unwrap();
        assert_eq!(change.change_exp, Exponent::from(int(13)));
        // 13^-1 mod 60 = 37
        assert_eq!(
            change.signed_change_blinded.as_biguint(),
            &int(16).modpow(&int(37), &int(77))
        );
        assert_eq!(payee.received(), Amount::from(1));
    }

    #[test]
    fn credits_accumulate() {
        let payee = payee_with(toy_bank());
        assert!(payee.accept(&spend(3, None)).unwrap().is_accepted());
        assert!(payee
            .accept(&spend(1, Some(&change_of_two())))
            .unwrap()
            .is_accepted());
        assert_eq!(payee.received(), Amount::from(4));
    }

    #[test]
    fn nothing_is_credited_without_the_bank() {
        let payee = payee_with(DownBank);
        assert!(matches!(
            payee.accept(&spend(1, Some(&change_of_two()))),
            Err(Error::Transport(TransportError::Unreachable(_)))
        ));
        assert_eq!(payee.received(), Amount::ZERO);

        // A full payment needs no bank.
        assert!(payee.accept(&spend(3, None)).unwrap().is_accepted());
        assert_eq!(payee.received(), Amount::from(3));
    }
}
