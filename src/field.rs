//! BN254 scalar field elements as they appear in circuit inputs.
//!
//! Values serialize as decimal strings, which is the format witness calculators
//! consume. Parsing accepts decimal or `0x`-prefixed hex and rejects values that are
//! not reduced modulo the field order.

use crate::error::ParseError;
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Size of a serialized field element in bytes.
pub const FIELD_SIZE: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement(Fr);

impl FieldElement {
    pub fn zero() -> Self {
        FieldElement(Fr::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Interprets big-endian bytes as an integer and reduces it modulo the field order.
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        FieldElement(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Interprets little-endian bytes as an integer and reduces it modulo the field order.
    pub fn from_le_bytes_mod_order(bytes: &[u8]) -> Self {
        FieldElement(Fr::from_le_bytes_mod_order(bytes))
    }

    pub fn from_biguint(value: &BigUint) -> Self {
        FieldElement(Fr::from(value.clone()))
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from(self.0)
    }

    pub fn to_be_bytes(&self) -> [u8; FIELD_SIZE] {
        let mut out = [0u8; FIELD_SIZE];
        let bytes = self.0.into_bigint().to_bytes_be();
        out[FIELD_SIZE - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// `0x`-prefixed, zero-padded 64-character hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    /// Bit `i` of the canonical integer representation, least significant first.
    pub fn bit(&self, i: usize) -> bool {
        self.0.into_bigint().get_bit(i)
    }

    pub fn inner(&self) -> Fr {
        self.0
    }

    pub fn modulus() -> BigUint {
        BigUint::from(Fr::MODULUS)
    }
}

impl From<Fr> for FieldElement {
    fn from(value: Fr) -> Self {
        FieldElement(value)
    }
}

impl From<FieldElement> for Fr {
    fn from(value: FieldElement) -> Self {
        value.0
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        FieldElement(Fr::from(value))
    }
}

impl From<u8> for FieldElement {
    fn from(value: u8) -> Self {
        FieldElement(Fr::from(value as u64))
    }
}

impl From<bool> for FieldElement {
    fn from(value: bool) -> Self {
        FieldElement(Fr::from(value as u64))
    }
}

impl From<usize> for FieldElement {
    fn from(value: usize) -> Self {
        FieldElement(Fr::from(value as u64))
    }
}

impl FromStr for FieldElement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex_digits) => BigUint::parse_bytes(hex_digits.as_bytes(), 16),
            None => BigUint::parse_bytes(trimmed.as_bytes(), 10),
        }
        .ok_or_else(|| ParseError::FieldElement(s.to_string()))?;

        if value >= Self::modulus() {
            return Err(ParseError::FieldElement(format!(
                "{s} is not reduced modulo the field order"
            )));
        }
        Ok(Self::from_biguint(&value))
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_biguint())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct FieldElementVisitor;

impl<'de> Visitor<'de> for FieldElementVisitor {
    type Value = FieldElement;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal or 0x-prefixed hex field element")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        FieldElement::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(FieldElement::from(v))
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldElementVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_and_hex_parse_agree() {
        let a: FieldElement = "255".parse().unwrap();
        let b: FieldElement = "0xff".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "255");
    }

    #[test]
    fn test_zero_displays_as_zero() {
        assert_eq!(FieldElement::zero().to_string(), "0");
        assert!(FieldElement::zero().is_zero());
    }

    #[test]
    fn test_rejects_unreduced_value() {
        let modulus = FieldElement::modulus().to_string();
        assert!(modulus.parse::<FieldElement>().is_err());
        assert!("not a number".parse::<FieldElement>().is_err());
    }

    #[test]
    fn test_be_bytes_roundtrip() {
        let value = FieldElement::from(0x0102_0304u64);
        let bytes = value.to_be_bytes();
        assert_eq!(&bytes[28..], &[1, 2, 3, 4]);
        assert_eq!(FieldElement::from_be_bytes_mod_order(&bytes), value);
        assert_eq!(
            value.to_hex(),
            "0x0000000000000000000000000000000000000000000000000000000001020304"
        );
    }

    #[test]
    fn test_bits_are_lsb_first() {
        let value = FieldElement::from(0b1010u64);
        assert!(!value.bit(0));
        assert!(value.bit(1));
        assert!(!value.bit(2));
        assert!(value.bit(3));
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let value = FieldElement::from(42u64);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"42\"");
        let back: FieldElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        let from_number: FieldElement = serde_json::from_str("42").unwrap();
        assert_eq!(from_number, value);
    }
}
