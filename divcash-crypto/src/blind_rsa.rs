/*!
RSA-style blind signatures over a shared modulus, with full and scoped issuance.

The flow for a single token:

1. the client picks a [`RawValue`] `s` and a [`BlindingFactor`] `r`, and sends
   `s * r^e mod n` as a [`BlindedMessage`],
2. the bank raises the blinded message to `e^-1 mod totient`, producing a [`BlindedSignature`],
3. the client multiplies by `r^-1 mod n` to obtain the [`Signature`] `s^(1/e)`.

Full issuance uses `e = h`. Scoped issuance (change) uses an arbitrary denomination exponent.

A holder of `sig = s^(1/h)` proves a sub-value `a` by disclosing `sig^encode(a)`, a
[`RevealedValue`]; anyone can raise it to the complementary exponent `h / encode(a)` and compare
against `s`.

Raw values and blinding factors are client secrets. Their `Debug` output is redacted.
*/
use crate::{arith, Error, Exponent, KeyPair, PublicParameters, Rng};
use num_bigint::BigUint;
use serde::*;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Upper bound on draws when sampling a blinding factor. For a product of two large primes the
/// chance of even one rejection is negligible.
const MAX_BLINDING_FACTOR_DRAWS: usize = 64;

/// A short, non-reversible identifier for a secret value, suitable for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 8]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

fn fingerprint(value: &BigUint) -> Fingerprint {
    let digest = Sha3_256::digest(&value.to_bytes_be());
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest[..8]);
    Fingerprint(bytes)
}

/// The value a token certifies. Chosen by the client and never shown to the bank.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawValue(BigUint);

impl RawValue {
    /// Draw a raw value uniformly from `[2, n-1]`.
    pub fn new(rng: &mut impl Rng, params: &PublicParameters) -> Self {
        Self(arith::random_below_modulus(rng, params.modulus()))
    }

    /// Get the raw value as an integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// A log-safe identifier for this raw value.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.0)
    }
}

impl From<BigUint> for RawValue {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl AsRef<BigUint> for RawValue {
    fn as_ref(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawValue({})", self.fingerprint())
    }
}

/// Blinding factor for a message and its signature: a unit of `Z_n` in `[2, n-1]`.
///
/// The inverse is computed once on construction, so unblinding cannot fail. Blinding factors
/// only live for one exchange and are never serialized: a stored inverse could not be trusted.
#[derive(Clone, PartialEq, Eq)]
pub struct BlindingFactor {
    value: BigUint,
    inverse: BigUint,
}

impl BlindingFactor {
    /// Sample a blinding factor uniformly from the units in `[2, n-1]`, redrawing on
    /// non-coprime values.
    pub fn new(rng: &mut impl Rng, params: &PublicParameters) -> Result<Self, Error> {
        for _ in 0..MAX_BLINDING_FACTOR_DRAWS {
            let candidate = arith::random_below_modulus(rng, params.modulus());
            if let Ok(inverse) = arith::mod_inverse(&candidate, params.modulus()) {
                return Ok(Self {
                    value: candidate,
                    inverse,
                });
            }
        }
        Err(Error::BlindingFactor {
            attempts: MAX_BLINDING_FACTOR_DRAWS,
        })
    }

    /// Construct a blinding factor from a known value.
    ///
    /// **warning:** this should never be used unless reproducing a known exchange!
    pub fn from_biguint(params: &PublicParameters, value: BigUint) -> Result<Self, Error> {
        if value < BigUint::from(2_u8) || &value >= params.modulus() {
            return Err(Error::InvalidBlindingFactor);
        }
        let inverse = arith::mod_inverse(&value, params.modulus())
            .map_err(|_| Error::InvalidBlindingFactor)?;
        Ok(Self { value, inverse })
    }

    /// Get the blinding factor as an integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.value
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlindingFactor({})", fingerprint(&self.value))
    }
}

macro_rules! public_integer {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(BigUint);

        impl $name {
            /// Get the underlying integer.
            pub fn as_biguint(&self) -> &BigUint {
                &self.0
            }
        }

        impl From<BigUint> for $name {
            fn from(value: BigUint) -> Self {
                Self(value)
            }
        }

        impl AsRef<BigUint> for $name {
            fn as_ref(&self) -> &BigUint {
                &self.0
            }
        }
    };
}

public_integer!(
    /// A message, blinded for use in the blind signature protocol. Safe to show the bank.
    BlindedMessage
);

public_integer!(
    /// A signature on a blinded message. Only its requester can unblind it.
    BlindedSignature
);

public_integer!(
    /// An unblinded signature: a raw value raised to the inverse of the issuing exponent.
    Signature
);

public_integer!(
    /// A signature raised to a payment exponent, proving a sub-value without disclosing the
    /// signature itself.
    RevealedValue
);

impl PublicParameters {
    /// Blind a raw value for signing under `exponent`: `raw * bf^exponent mod n`.
    pub fn blind_message(
        &self,
        raw: &RawValue,
        bf: &BlindingFactor,
        exponent: &Exponent,
    ) -> BlindedMessage {
        let n = self.modulus();
        let masked = bf.value.modpow(exponent.as_biguint(), n);
        BlindedMessage((&raw.0 * masked) % n)
    }

    /// Check a fully-issued signature against its raw value: `sig^h == raw (mod n)`.
    pub fn verify_signature(&self, sig: &Signature, raw: &RawValue) -> bool {
        sig.0.modpow(self.h(), self.modulus()) == raw.0
    }

    /// Check a payment reveal made with `exponent` against the claimed raw value.
    ///
    /// Computes `revealed^(h / exponent) mod n`. Fails if `exponent` does not divide `h`.
    pub fn verify_reveal(
        &self,
        revealed: &RevealedValue,
        exponent: &Exponent,
        claimed: &RawValue,
    ) -> Result<bool, Error> {
        let check = exponent.complement(self)?;
        Ok(revealed.0.modpow(check.as_biguint(), self.modulus()) == claimed.0)
    }

    /// Check a change bill issued under `exponent` against its raw value:
    /// `bill^exponent == claimed (mod n)`.
    pub fn verify_change(&self, bill: &Signature, exponent: &Exponent, claimed: &RawValue) -> bool {
        bill.0.modpow(exponent.as_biguint(), self.modulus()) == claimed.0
    }
}

impl KeyPair {
    /// Sign a blinded message under the global exponent `h`.
    ///
    /// **Warning**: the signer learns nothing about the message. Nothing binds the signature to
    /// an amount; the value of a fully-issued token is fixed by the alphabet, not the request.
    pub fn blind_sign(&self, msg: &BlindedMessage) -> BlindedSignature {
        let pk = self.public_parameters();
        BlindedSignature(msg.0.modpow(&self.secret_key().d, pk.modulus()))
    }

    /// Sign a blinded message under an arbitrary exponent.
    ///
    /// The exponent is inverted as presented; callers that need it to be a denomination
    /// exponent must check that first. Fails with [`Error::NonInvertibleExponent`] if the
    /// exponent shares a factor with the totient.
    pub fn blind_sign_scoped(
        &self,
        msg: &BlindedMessage,
        exponent: &Exponent,
    ) -> Result<BlindedSignature, Error> {
        let inverse = arith::mod_inverse(exponent.as_biguint(), &self.secret_key().totient)
            .map_err(|_| Error::NonInvertibleExponent)?;
        Ok(BlindedSignature(
            msg.0.modpow(&inverse, self.public_parameters().modulus()),
        ))
    }
}

impl BlindedSignature {
    /// Unblind a [`BlindedSignature`]. This will always compute: the user must take care to use
    /// the blinding factor that produced the corresponding [`BlindedMessage`] in order to
    /// retrieve a valid [`Signature`].
    pub fn unblind(&self, bf: &BlindingFactor, params: &PublicParameters) -> Signature {
        Signature((&self.0 * &bf.inverse) % params.modulus())
    }
}

impl Signature {
    /// Raise the signature to a payment exponent, revealing the sub-value `exponent` encodes.
    pub fn reveal(&self, exponent: &Exponent, params: &PublicParameters) -> RevealedValue {
        RevealedValue(self.0.modpow(exponent.as_biguint(), params.modulus()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> impl Rng {
        rand::rngs::StdRng::from_seed(*b"DON'T USE THIS FOR ANYTHING REAL")
    }

    fn params() -> PublicParameters {
        PublicParameters::new(BigUint::from(77_u32), vec![11, 13, 17]).unwrap()
    }

    #[test]
    fn sampled_blinding_factors_are_units() {
        let mut rng = rng();
        let params = params();
        for _ in 0..100 {
            let bf = BlindingFactor::new(&mut rng, &params).unwrap();
            assert!(arith::is_coprime(bf.as_biguint(), params.modulus()));
            assert!(bf.as_biguint() >= &BigUint::from(2_u8));
            assert!(bf.as_biguint() < params.modulus());
        }
    }

    #[test]
    fn known_blinding_factor_must_be_a_unit() {
        let params = params();
        for bad in [0_u32, 1, 7, 22, 77, 100] {
            assert_eq!(
                BlindingFactor::from_biguint(&params, BigUint::from(bad)).unwrap_err(),
                Error::InvalidBlindingFactor
            );
        }
        assert!(BlindingFactor::from_biguint(&params, BigUint::from(2_u32)).is_ok());
    }

    #[test]
    fn every_constructor_pairs_value_and_inverse() {
        let mut rng = rng();
        let params = params();
        let one = BigUint::from(1_u8);
        let known = BlindingFactor::from_biguint(&params, BigUint::from(2_u32)).unwrap();
        assert_eq!(known.inverse, BigUint::from(39_u32));
        for _ in 0..20 {
            let bf = BlindingFactor::new(&mut rng, &params).unwrap();
            assert_eq!((&bf.value * &bf.inverse) % params.modulus(), one);
        }
    }

    #[test]
    fn secrets_are_redacted() {
        let params = params();
        let raw = RawValue::from(BigUint::from(4_u32));
        let bf = BlindingFactor::from_biguint(&params, BigUint::from(2_u32)).unwrap();
        assert_eq!(format!("{:?}", raw), format!("RawValue({})", raw.fingerprint()));
        assert!(format!("{:?}", bf).starts_with("BlindingFactor("));
    }

    #[test]
    fn reveal_rejects_foreign_exponent() {
        let params = params();
        let revealed = RevealedValue::from(BigUint::from(37_u32));
        let raw = RawValue::from(BigUint::from(4_u32));
        assert_eq!(
            params
                .verify_reveal(&revealed, &Exponent::from(BigUint::from(3_u32)), &raw)
                .unwrap_err(),
            Error::NotADenominationExponent
        );
    }
}
