//! Domain parameters shared by the bank and every client, and the bank-only key pair.
//!
//! The public half is an RSA-style modulus `n` together with an ordered alphabet of `k` distinct
//! odd primes (the *divisors*). Their product `h` is the global public exponent used for full
//! issuance. The secret half is the factorization `n = p * q` and the totient
//! `(p - 1)(q - 1)`, from which the bank derives every signing exponent.
//!
//! Every subset product of the divisors must be invertible modulo the totient; since `h` is the
//! product of all divisors, this holds exactly when `gcd(h, totient) = 1`, which [`KeyPair`]
//! checks on construction.

use crate::{arith, Error};
use num_bigint::BigUint;
use num_traits::One;
use serde::*;
use std::{collections::HashSet, convert::TryFrom, fmt};

/// The largest supported alphabet. Amounts are `u64` and the largest amount is `2^k - 1`.
pub const MAX_DIVISORS: usize = 63;

/// Public domain parameters: the modulus, the divisor alphabet, and the derived exponent `h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedPublicParameters")]
pub struct PublicParameters {
    modulus: BigUint,
    divisors: Vec<u64>,
    #[serde(skip_serializing)]
    h: BigUint,
}

#[derive(Debug, Deserialize)]
struct UncheckedPublicParameters {
    modulus: BigUint,
    divisors: Vec<u64>,
}

impl TryFrom<UncheckedPublicParameters> for PublicParameters {
    type Error = Error;

    fn try_from(unchecked: UncheckedPublicParameters) -> Result<Self, Self::Error> {
        PublicParameters::new(unchecked.modulus, unchecked.divisors)
    }
}

fn is_odd_prime(candidate: u64) -> bool {
    if candidate < 3 || candidate % 2 == 0 {
        return false;
    }
    let mut factor = 3;
    while factor <= candidate / factor {
        if candidate % factor == 0 {
            return false;
        }
        factor += 2;
    }
    true
}

impl PublicParameters {
    /// Validate and assemble public parameters.
    ///
    /// Fails if the modulus is too small to sample from `[2, n-1]`, if the alphabet is empty or
    /// longer than [`MAX_DIVISORS`], or if any divisor is repeated or is not an odd prime.
    pub fn new(modulus: BigUint, divisors: Vec<u64>) -> Result<Self, Error> {
        if modulus <= BigUint::from(3_u8) {
            return Err(Error::InvalidParameters(
                "modulus must be greater than 3".to_string(),
            ));
        }
        if divisors.is_empty() || divisors.len() > MAX_DIVISORS {
            return Err(Error::InvalidParameters(format!(
                "expected between 1 and {} divisors, got {}",
                MAX_DIVISORS,
                divisors.len()
            )));
        }
        if let Some(bad) = divisors.iter().find(|d| !is_odd_prime(**d)) {
            return Err(Error::InvalidParameters(format!(
                "divisor {} is not an odd prime",
                bad
            )));
        }
        let mut seen = HashSet::with_capacity(divisors.len());
        if let Some(repeated) = divisors.iter().find(|d| !seen.insert(**d)) {
            return Err(Error::InvalidParameters(format!(
                "divisor {} appears more than once",
                repeated
            )));
        }

        let h = divisors
            .iter()
            .fold(BigUint::one(), |acc, divisor| acc * *divisor);

        Ok(Self {
            modulus,
            divisors,
            h,
        })
    }

    /// The shared modulus `n`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// The ordered divisor alphabet. `divisors()[i]` encodes bit `i` of an amount.
    pub fn divisors(&self) -> &[u64] {
        &self.divisors
    }

    /// The global public exponent: the product of every divisor.
    pub fn h(&self) -> &BigUint {
        &self.h
    }

    /// The alphabet length `k`.
    pub fn denomination_count(&self) -> usize {
        self.divisors.len()
    }
}

/// Bank-only secret key material.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SecretKey {
    pub p: BigUint,
    pub q: BigUint,
    pub totient: BigUint,
    /// Inverse of `h` modulo the totient; the full-issuance signing exponent.
    pub d: BigUint,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

/// A keypair formed from the bank's secret factorization and the [`PublicParameters`] it
/// signs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyMaterial", into = "KeyMaterial")]
pub struct KeyPair {
    sk: SecretKey,
    pk: PublicParameters,
}

/// Serialized form of a [`KeyPair`]: the factors and the alphabet. Everything else is derived
/// and re-validated on load.
#[derive(Serialize, Deserialize)]
struct KeyMaterial {
    p: BigUint,
    q: BigUint,
    divisors: Vec<u64>,
}

impl TryFrom<KeyMaterial> for KeyPair {
    type Error = Error;

    fn try_from(material: KeyMaterial) -> Result<Self, Self::Error> {
        KeyPair::new(material.divisors, material.p, material.q)
    }
}

impl From<KeyPair> for KeyMaterial {
    fn from(kp: KeyPair) -> Self {
        KeyMaterial {
            p: kp.sk.p,
            q: kp.sk.q,
            divisors: kp.pk.divisors,
        }
    }
}

impl KeyPair {
    /// Build a keypair from the divisor alphabet and the two factors of the modulus.
    ///
    /// Fails with [`Error::NonInvertibleExponent`] if `h` shares a factor with the totient. This
    /// is a fatal configuration fault: no token could ever be issued under such parameters.
    pub fn new(divisors: Vec<u64>, p: BigUint, q: BigUint) -> Result<Self, Error> {
        let one = BigUint::one();
        if p <= one || q <= one {
            return Err(Error::InvalidParameters(
                "both factors must be greater than 1".to_string(),
            ));
        }

        let pk = PublicParameters::new(&p * &q, divisors)?;
        let totient = (&p - &one) * (&q - &one);
        let d = arith::mod_inverse(pk.h(), &totient).map_err(|_| Error::NonInvertibleExponent)?;

        Ok(Self {
            sk: SecretKey { p, q, totient, d },
            pk,
        })
    }

    /// Build a keypair for already-published parameters, checking that the factors match the
    /// published modulus.
    pub fn from_public_parameters(
        pk: &PublicParameters,
        p: BigUint,
        q: BigUint,
    ) -> Result<Self, Error> {
        if &(&p * &q) != pk.modulus() {
            return Err(Error::InvalidParameters(
                "factors do not multiply to the published modulus".to_string(),
            ));
        }
        Self::new(pk.divisors().to_vec(), p, q)
    }

    /// Get the public parameters this keypair signs under.
    pub fn public_parameters(&self) -> &PublicParameters {
        &self.pk
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.sk
    }
}
