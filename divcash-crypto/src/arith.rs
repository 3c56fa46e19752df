//! Modular arithmetic over arbitrary-precision integers.
//!
//! Exponentiation is [`BigUint::modpow`]; this module adds the pieces `num-bigint` leaves to the
//! caller: inverses, coprimality, and uniform sampling of candidate units.

use crate::{Error, Rng};
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use std::mem;

/// Compute `a^-1 mod m` with the extended Euclidean algorithm.
///
/// Fails with [`Error::NotInvertible`] if `gcd(a, m) != 1` or `m < 2`; a non-coprime input has
/// no meaningful inverse and is never silently reduced to one.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, Error> {
    if m <= &BigUint::one() {
        return Err(Error::NotInvertible);
    }

    let modulus = BigInt::from(m.clone());
    let (mut old_r, mut r) = (BigInt::from(a % m), modulus.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return Err(Error::NotInvertible);
    }

    // Bezout coefficients may be negative; normalize into [0, m).
    old_s
        .mod_floor(&modulus)
        .to_biguint()
        .ok_or(Error::NotInvertible)
}

/// Check whether `gcd(a, b) == 1`.
pub fn is_coprime(a: &BigUint, b: &BigUint) -> bool {
    a.gcd(b).is_one()
}

/// Draw an integer uniformly from `[2, n-1]`.
///
/// The caller guarantees `n > 2`; [`PublicParameters`](crate::PublicParameters) enforces this
/// for every modulus it accepts.
pub fn random_below_modulus(rng: &mut impl Rng, n: &BigUint) -> BigUint {
    rng.gen_biguint_range(&BigUint::from(2_u8), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn inverse_of_worked_exponent() {
        assert_eq!(mod_inverse(&big(2431), &big(60)).unwrap(), big(31));
        assert_eq!(mod_inverse(&big(2), &big(77)).unwrap(), big(39));
    }

    #[test]
    fn inverse_reduces_large_inputs() {
        let inv = mod_inverse(&big(77 * 5 + 2), &big(77)).unwrap();
        assert_eq!((big(2) * inv) % big(77), big(1));
    }

    #[test]
    fn non_coprime_inputs_have_no_inverse() {
        assert_eq!(
            mod_inverse(&big(6), &big(60)).unwrap_err(),
            Error::NotInvertible
        );
        assert_eq!(
            mod_inverse(&big(0), &big(77)).unwrap_err(),
            Error::NotInvertible
        );
        assert_eq!(
            mod_inverse(&big(3), &big(1)).unwrap_err(),
            Error::NotInvertible
        );
    }

    #[test]
    fn coprimality() {
        assert!(is_coprime(&big(2431), &big(60)));
        assert!(!is_coprime(&big(14), &big(77)));
    }
}
