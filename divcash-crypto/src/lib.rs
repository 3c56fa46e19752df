//! This crate includes the cryptographic primitives for divisible e-cash over a shared RSA-style
//! modulus:
//! - Modular arithmetic over arbitrary-precision integers.
//! - Domain parameters: the modulus, the ordered divisor alphabet, and the signer's secret
//!   factorization.
//! - A denomination codec mapping an integer amount to a squarefree product of divisors.
//! - Blinding, full and scoped blind signing, unblinding, and partial reveals of a signature.

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod arith;
pub mod blind_rsa;
pub mod denomination;
pub mod parameters;

pub use crate::{
    blind_rsa::{
        BlindedMessage, BlindedSignature, BlindingFactor, Fingerprint, RawValue, RevealedValue,
        Signature,
    },
    denomination::{Amount, Exponent},
    parameters::{KeyPair, PublicParameters},
};
pub use num_bigint::BigUint;

use thiserror::*;

/// Error types that may arise from cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caused by an amount that the denomination alphabet cannot represent, or that exceeds the
    /// amount it is being split from.
    #[error("amount {amount} is outside the permitted range 0..={max}")]
    OutOfRange {
        /// The rejected amount.
        amount: i128,
        /// The largest amount that would have been accepted.
        max: u64,
    },
    /// Caused by asking for the inverse of a value that shares a factor with the modulus.
    #[error("value has no inverse under the given modulus")]
    NotInvertible,
    /// Caused by a signing exponent that shares a factor with the totient.
    #[error("exponent is not invertible modulo the totient")]
    NonInvertibleExponent,
    /// Caused by an exponent that is not a product of a subset of the divisor alphabet.
    #[error("exponent is not a product of distinct divisors")]
    NotADenominationExponent,
    /// Caused by failing to draw a blinding factor coprime to the modulus.
    #[error("no blinding factor coprime to the modulus after {attempts} draws")]
    BlindingFactor {
        /// The number of rejected draws.
        attempts: usize,
    },
    /// Caused by supplying a blinding factor outside `[2, n-1]` or not coprime to the modulus.
    #[error("blinding factor is not a unit in [2, n-1]")]
    InvalidBlindingFactor,
    /// Caused by domain parameters or key material that violate their invariants.
    #[error("invalid domain parameters: {0}")]
    InvalidParameters(String),
}

/// A trait synonym for a cryptographically secure random number generator. This trait is
/// blanket-implemented for all valid types and will never need to be implemented by-hand.
pub trait Rng: rand_core::CryptoRng + rand_core::RngCore {}
impl<T: rand_core::CryptoRng + rand_core::RngCore> Rng for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> impl Rng {
        rand::rngs::StdRng::from_seed(*b"DON'T USE THIS FOR ANYTHING REAL")
    }

    fn small_keypair() -> KeyPair {
        KeyPair::new(
            vec![11, 13, 17],
            BigUint::from(7_u32),
            BigUint::from(11_u32),
        )
        .unwrap()
    }

    #[test]
    fn make_keypair() {
        let kp = small_keypair();
        assert_eq!(kp.public_parameters().modulus(), &BigUint::from(77_u32));
        assert_eq!(kp.public_parameters().h(), &BigUint::from(2431_u32));
    }

    #[test]
    fn blind_signing_is_correct() {
        let mut rng = rng();
        let kp = small_keypair();
        let params = kp.public_parameters();

        let raw = RawValue::from(BigUint::from(4_u32));
        let bf = BlindingFactor::new(&mut rng, params).unwrap();
        let h = Exponent::from(params.h().clone());
        let blinded_msg = params.blind_message(&raw, &bf, &h);
        let blind_sig = kp.blind_sign(&blinded_msg);
        let sig = blind_sig.unblind(&bf, params);

        assert!(
            params.verify_signature(&sig, &raw),
            "Signature didn't verify!!"
        );
    }

    #[test]
    fn scoped_signing_is_correct() {
        let mut rng = rng();
        let kp = small_keypair();
        let params = kp.public_parameters();

        let t = RawValue::from(BigUint::from(10_u32));
        let ra = BlindingFactor::new(&mut rng, params).unwrap();
        let change_exp = params.encode(Amount::from(6)).unwrap();
        let blinded = params.blind_message(&t, &ra, &change_exp);
        let bill = kp
            .blind_sign_scoped(&blinded, &change_exp)
            .unwrap()
            .unblind(&ra, params);

        assert!(params.verify_change(&bill, &change_exp, &t));
    }
}
