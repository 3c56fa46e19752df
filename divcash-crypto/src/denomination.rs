//! The denomination codec: amounts as squarefree products of the divisor alphabet.
//!
//! An amount `a` in `[0, 2^k - 1]` is encoded as the product of every `divisors[i]` for which
//! bit `i` of `a` (counted from the least-significant bit) is set. The empty product is 1, so
//! the zero amount encodes to the exponent 1. Distinct amounts select distinct subsets, and
//! distinct subsets of distinct primes have distinct products, so the encoding is injective.
//!
//! Only the forward direction exists. The bank and the payee never recover an amount from an
//! exponent; they check a claimed amount by re-encoding it.

use crate::{Error, PublicParameters};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::*;
use std::{convert::TryFrom, fmt};

/// A non-negative amount of value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Get the amount as an integer.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Subtract `other` from this amount, or `None` if it would go negative.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Whether this is the zero amount.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signing or reveal exponent.
///
/// Exponents produced by [`PublicParameters::encode`] are always squarefree subset products of
/// the divisor alphabet. Exponents received from a counterpart are not checked on construction;
/// use [`PublicParameters::is_denomination_exponent`] where that matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exponent(BigUint);

impl Exponent {
    /// Get the exponent as an integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Compute the complementary exponent `h / self`.
    ///
    /// Raising a reveal made with `self` to the complement restores the full exponent `h`.
    pub fn complement(&self, params: &PublicParameters) -> Result<Exponent, Error> {
        if !params.is_denomination_exponent(self) {
            return Err(Error::NotADenominationExponent);
        }
        Ok(Exponent(params.h() / &self.0))
    }
}

impl From<BigUint> for Exponent {
    fn from(value: BigUint) -> Self {
        Exponent(value)
    }
}

impl AsRef<BigUint> for Exponent {
    fn as_ref(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PublicParameters {
    /// The largest representable amount, `2^k - 1`.
    pub fn max_amount(&self) -> Amount {
        Amount(u64::MAX >> (64 - self.denomination_count()))
    }

    /// Check that `amount` is representable by the alphabet.
    pub fn check_amount(&self, amount: Amount) -> Result<Amount, Error> {
        let max = self.max_amount();
        if amount > max {
            return Err(Error::OutOfRange {
                amount: i128::from(amount.0),
                max: max.0,
            });
        }
        Ok(amount)
    }

    /// Convert a signed integer, as received from an untrusted source, into a representable
    /// [`Amount`].
    pub fn amount(&self, value: i64) -> Result<Amount, Error> {
        match u64::try_from(value) {
            Ok(value) => self.check_amount(Amount(value)),
            Err(_) => Err(Error::OutOfRange {
                amount: i128::from(value),
                max: self.max_amount().0,
            }),
        }
    }

    /// Encode an amount as the product of the divisors selected by its set bits.
    pub fn encode(&self, amount: Amount) -> Result<Exponent, Error> {
        let amount = self.check_amount(amount)?;
        let product = self
            .divisors()
            .iter()
            .enumerate()
            .filter(|(bit, _)| (amount.0 >> bit) & 1 == 1)
            .fold(BigUint::one(), |acc, (_, divisor)| acc * *divisor);
        Ok(Exponent(product))
    }

    /// Whether `exponent` is a product of distinct divisors, i.e. a positive divisor of `h`.
    pub fn is_denomination_exponent(&self, exponent: &Exponent) -> bool {
        !exponent.0.is_zero() && (self.h() % &exponent.0).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn params() -> PublicParameters {
        PublicParameters::new(BigUint::from(77_u32), vec![11, 13, 17]).unwrap()
    }

    fn exp(n: u64) -> Exponent {
        Exponent(BigUint::from(n))
    }

    #[test]
    fn encodes_least_significant_bit_first() {
        let params = params();
        assert_eq!(params.encode(Amount(0)).unwrap(), exp(1));
        assert_eq!(params.encode(Amount(1)).unwrap(), exp(11));
        assert_eq!(params.encode(Amount(2)).unwrap(), exp(13));
        assert_eq!(params.encode(Amount(5)).unwrap(), exp(11 * 17));
        assert_eq!(params.encode(Amount(7)).unwrap(), exp(2431));
    }

    #[test]
    fn every_amount_maps_to_a_distinct_divisor_of_h() {
        let params = params();
        let mut seen = HashSet::new();
        for a in 0..=params.max_amount().value() {
            let e = params.encode(Amount(a)).unwrap();
            assert!(params.is_denomination_exponent(&e));
            assert!(seen.insert(e));
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn rejects_amounts_outside_the_alphabet() {
        let params = params();
        assert_eq!(
            params.encode(Amount(8)).unwrap_err(),
            Error::OutOfRange { amount: 8, max: 7 }
        );
        assert_eq!(
            params.amount(-1).unwrap_err(),
            Error::OutOfRange { amount: -1, max: 7 }
        );
        assert_eq!(params.amount(7).unwrap(), Amount(7));
    }

    #[test]
    fn complement_restores_h() {
        let params = params();
        assert_eq!(exp(11).complement(&params).unwrap(), exp(221));
        assert_eq!(exp(1).complement(&params).unwrap(), exp(2431));
        assert_eq!(
            exp(3).complement(&params).unwrap_err(),
            Error::NotADenominationExponent
        );
        assert!(!params.is_denomination_exponent(&exp(0)));
    }

    #[test]
    fn single_divisor_alphabet() {
        let params = PublicParameters::new(BigUint::from(77_u32), vec![13]).unwrap();
        assert_eq!(params.max_amount(), Amount(1));
        assert_eq!(params.encode(Amount(1)).unwrap(), exp(13));
    }
}
