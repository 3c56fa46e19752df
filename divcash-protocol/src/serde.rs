//! Serde helpers for big integers on the JSON wire.
//!
//! Counterparts exchange protocol integers as bare JSON numbers, far wider than any native
//! integer type. With serde_json's `arbitrary_precision` feature a [`serde_json::Number`]
//! carries its exact decimal digits, so these helpers go through it rather than through
//! `num-bigint`'s own (digit-vector) serde representation.
//!
//! Use with `#[serde(with = "crate::serde::decimal")]` on any field whose type converts to and
//! from [`BigUint`], and `crate::serde::optional_decimal` for `Option`s of such fields.

use num_bigint::BigUint;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::str::FromStr;

fn to_number<E: ser::Error>(value: &BigUint) -> Result<Number, E> {
    Number::from_str(&value.to_str_radix(10)).map_err(E::custom)
}

fn from_number<E: de::Error>(number: Number) -> Result<BigUint, E> {
    BigUint::from_str(&number.to_string())
        .map_err(|_| E::custom(format!("expected a non-negative integer, got {}", number)))
}

pub(crate) mod decimal {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<BigUint>,
        S: Serializer,
    {
        to_number(value.as_ref())?.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: From<BigUint>,
        D: Deserializer<'de>,
    {
        let number = Number::deserialize(deserializer)?;
        from_number(number).map(T::from)
    }
}

pub(crate) mod optional_decimal {
    use super::*;

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<BigUint>,
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(&to_number::<S::Error>(value.as_ref())?),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: From<BigUint>,
        D: Deserializer<'de>,
    {
        Option::<Number>::deserialize(deserializer)?
            .map(|number| from_number(number).map(T::from))
            .transpose()
    }
}
