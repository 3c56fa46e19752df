#![allow(dead_code)]
use divcash_crypto::{BigUint, KeyPair};
use rand::SeedableRng;
use std::str::FromStr;

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

pub fn rng_from_seed(seed: [u8; 32]) -> (impl rand::CryptoRng + rand::RngCore) {
    rand::rngs::StdRng::from_seed(seed)
}

pub const DIVISORS: [u64; 39] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173,
];

const P: &str = "91480584166578905373273495367858856924625303800544241237892516956359041631323";
const Q: &str = "80239100220322239951066602079734678804545438199680465293877204586565106798709";

// Full-size key pair with the 39-prime alphabet.
pub fn keypair() -> KeyPair {
    KeyPair::new(
        DIVISORS.to_vec(),
        BigUint::from_str(P).unwrap(),
        BigUint::from_str(Q).unwrap(),
    )
    .unwrap()
}

// The p = 7, q = 11 toy key pair with alphabet [11, 13, 17].
pub fn toy_keypair() -> KeyPair {
    KeyPair::new(vec![11, 13, 17], BigUint::from(7_u32), BigUint::from(11_u32)).unwrap()
}
