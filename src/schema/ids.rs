//! Identifier newtypes shared by every record collection.
//!
//! Scenario codes in the wild carry ids as JSON numbers, numeric strings,
//! or occasionally floats, so both id types deserialize leniently and
//! always serialize back as plain integers.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Primary key, unique across every collection in a store (never
/// per-table). Allocated by [`EntityStore::new_pk`](crate::core::store::EntityStore::new_pk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Pk(pub i64);

/// Candidate identifier. Candidates are not modeled as records; they
/// exist only as ids referenced from multiplier and score rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CandidateId(pub i64);

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct LenientI64Visitor;

impl Visitor<'_> for LenientI64Visitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, an integral float, or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom(format!("id out of range: {}", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        if v.is_finite() && v.fract() == 0.0 && v.abs() <= 9_007_199_254_740_992.0 {
            Ok(v as i64)
        } else {
            Err(E::custom(format!("id is not an integral number: {}", v)))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        let trimmed = v.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Ok(n);
        }
        // Some exporters stringify ids as floats ("12.0").
        match trimmed.parse::<f64>() {
            Ok(f) => self.visit_f64(f),
            Err(_) => Err(E::custom(format!("id is not numeric: {:?}", v))),
        }
    }
}

impl<'de> Deserialize<'de> for Pk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientI64Visitor).map(Pk)
    }
}

impl<'de> Deserialize<'de> for CandidateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(LenientI64Visitor)
            .map(CandidateId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pk_from_number() {
        let pk: Pk = serde_json::from_str("42").unwrap();
        assert_eq!(pk, Pk(42));
    }

    #[test]
    fn pk_from_numeric_string() {
        let pk: Pk = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(pk, Pk(42));
    }

    #[test]
    fn pk_from_stringified_float() {
        let pk: Pk = serde_json::from_str("\"42.0\"").unwrap();
        assert_eq!(pk, Pk(42));
    }

    #[test]
    fn pk_from_integral_float() {
        let pk: Pk = serde_json::from_str("42.0").unwrap();
        assert_eq!(pk, Pk(42));
    }

    #[test]
    fn pk_rejects_fractional() {
        assert!(serde_json::from_str::<Pk>("42.5").is_err());
    }

    #[test]
    fn pk_rejects_non_numeric_string() {
        assert!(serde_json::from_str::<Pk>("\"abc\"").is_err());
    }

    #[test]
    fn pk_rejects_huge_float() {
        assert!(serde_json::from_str::<Pk>("9e20").is_err());
    }

    #[test]
    fn pk_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&Pk(7)).unwrap(), "7");
    }

    #[test]
    fn candidate_id_round_trip() {
        let id: CandidateId = serde_json::from_str("\"300\"").unwrap();
        assert_eq!(id, CandidateId(300));
        assert_eq!(serde_json::to_string(&id).unwrap(), "300");
    }
}
