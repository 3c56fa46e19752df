//! Routines for the bank: signing blinded tokens and blinded change.
//!
//! The bank never sees a raw value. It signs whatever blinded message it is given, so nothing in
//! this module is logged beyond the size of the exponent it signed under.

use crate::{
    messages::{
        BanknoteRequest, BanknoteResponse, ChangeSigningRequest, ChangeSigningResponse, Status,
    },
    Error, KeyPair, PublicParameters,
};
use num_bigint::BigUint;
use tracing::{info, warn};

/// A bank that is ready to issue tokens and change.
///
/// Holds the key pair used throughout the lifetime of the domain.
#[derive(Debug)]
pub struct Config {
    keypair: KeyPair,
}

impl Config {
    /// Instantiate a bank with its key pair.
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Instantiate a bank for published parameters from the secret factorization of their
    /// modulus.
    pub fn from_factors(params: &PublicParameters, p: BigUint, q: BigUint) -> Result<Self, Error> {
        Ok(Self::new(KeyPair::from_public_parameters(params, p, q)?))
    }

    /// The domain parameters this bank signs for.
    pub fn params(&self) -> &PublicParameters {
        self.keypair.public_parameters()
    }

    /// Sign a blinded token under the global exponent `h`.
    ///
    /// Refuses messages that are not reduced modulo `n`; otherwise always signs.
    pub fn sign_banknote(&self, request: &BanknoteRequest) -> BanknoteResponse {
        if request.banknote.as_biguint() >= self.params().modulus() {
            warn!("refusing unreduced banknote");
            return BanknoteResponse::refused();
        }
        let signed = self.keypair.blind_sign(&request.banknote);
        info!("signed banknote");
        BanknoteResponse::signed(signed)
    }

    /**
    Sign blinded change under the exponent the payee forwarded.

    The exponent must be a product of distinct divisors; a payee that has checked the payment
    always forwards one. Fails with [`Error::NonInvertibleExponent`] if the exponent is not
    invertible modulo the totient, and with [`Error::Malformed`] for any other exponent or for an
    unreduced message.
    */
    pub fn sign_change(
        &self,
        request: &ChangeSigningRequest,
    ) -> Result<ChangeSigningResponse, Error> {
        let params = self.params();
        if request.blinded_change.as_biguint() >= params.modulus() {
            return Err(Error::Malformed("blinded change is not reduced".to_string()));
        }
        if !params.is_denomination_exponent(&request.change_exp) {
            return Err(Error::Malformed(
                "change_exp is not a product of distinct divisors".to_string(),
            ));
        }

        let signed = self
            .keypair
            .blind_sign_scoped(&request.blinded_change, &request.change_exp)?;
        info!(
            exponent_bits = request.change_exp.as_biguint().bits(),
            "signed change"
        );
        Ok(ChangeSigningResponse {
            status: Status::Ok,
            signed_change_blinded: signed,
        })
    }
}
