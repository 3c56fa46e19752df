//! Configuration files.
//!
//! A domain is described by a TOML file:
//!
//! ```toml
//! [domain]
//! modulus = "7340319761..."
//! divisors = [3, 5, 7, 11]
//! denominations = [100, 200, 500, 1000, 5000]
//!
//! [bank]
//! p = "91480584..."
//! q = "80239100..."
//!
//! [client]
//! request_timeout_ms = 30000
//! ```
//!
//! Big integers are decimal strings. The `[bank]` table holds the factorization of the modulus
//! and belongs only in the bank's copy of the file. The `[client]` table is optional.

use crate::{
    notes::{NoteRegistry, DEFAULT_DENOMINATIONS},
    Error, KeyPair, PublicParameters,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, str::FromStr, time::Duration};
use tracing::debug;

const DEFAULT_MODULUS: &str = "7340319761155748661749371063757287359076613120562021623339822878007\
    388760496894682101855614243031851692369942145494922651206179917235015123962197550362007";
const DEFAULT_P: &str =
    "91480584166578905373273495367858856924625303800544241237892516956359041631323";
const DEFAULT_Q: &str =
    "80239100220322239951066602079734678804545438199680465293877204586565106798709";
const DEFAULT_DIVISORS: [u64; 39] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173,
];

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn parse_integer(field: &str, value: &str) -> Result<BigUint, Error> {
    BigUint::from_str(value.trim())
        .map_err(|e| Error::Config(format!("{} is not a decimal integer: {}", field, e)))
}

/// Public domain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainSettings {
    /// The shared modulus `n`, in decimal.
    pub modulus: String,
    /// The ordered divisor alphabet.
    pub divisors: Vec<u64>,
    /// Permitted banknote face values.
    #[serde(default = "default_denominations")]
    pub denominations: Vec<u64>,
}

fn default_denominations() -> Vec<u64> {
    DEFAULT_DENOMINATIONS.to_vec()
}

/// The bank's secret factorization of the modulus.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BankSettings {
    /// First prime factor, in decimal.
    pub p: String,
    /// Second prime factor, in decimal.
    pub q: String,
}

impl std::fmt::Debug for BankSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankSettings").finish_non_exhaustive()
    }
}

/// Client behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    /// How long to wait on a counterpart before aborting, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Public domain parameters.
    pub domain: DomainSettings,
    /// The bank's secrets, if this is the bank's configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<BankSettings>,
    /// Client behavior.
    #[serde(default)]
    pub client: ClientSettings,
}

impl Default for Settings {
    /// The reference domain: a 39-prime alphabet over a 512-bit modulus, with the bank's
    /// factors.
    fn default() -> Self {
        Self {
            domain: DomainSettings {
                modulus: DEFAULT_MODULUS.to_string(),
                divisors: DEFAULT_DIVISORS.to_vec(),
                denominations: default_denominations(),
            },
            bank: Some(BankSettings {
                p: DEFAULT_P.to_string(),
                q: DEFAULT_Q.to_string(),
            }),
            client: ClientSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&contents)
    }

    /// Parse settings from TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write settings as TOML.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the public domain parameters.
    pub fn public_parameters(&self) -> Result<PublicParameters, Error> {
        let modulus = parse_integer("domain.modulus", &self.domain.modulus)?;
        PublicParameters::new(modulus, self.domain.divisors.clone())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the bank's key pair. Fails if the file has no `[bank]` table or its factors do
    /// not multiply to the modulus.
    pub fn keypair(&self) -> Result<KeyPair, Error> {
        let bank = self
            .bank
            .as_ref()
            .ok_or_else(|| Error::Config("missing [bank] table".to_string()))?;
        let params = self.public_parameters()?;
        let p = parse_integer("bank.p", &bank.p)?;
        let q = parse_integer("bank.q", &bank.q)?;
        Ok(KeyPair::from_public_parameters(&params, p, q)?)
    }

    /// An empty banknote table for the configured face values.
    pub fn note_registry(&self) -> Result<NoteRegistry, Error> {
        if self.domain.denominations.is_empty() {
            return Err(Error::Config("no banknote denominations".to_string()));
        }
        Ok(NoteRegistry::new(self.domain.denominations.clone()))
    }

    /// How long a client waits on a counterpart.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.client.request_timeout_ms)
    }
}
