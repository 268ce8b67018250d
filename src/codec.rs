//! Unsigned, big-endian, minimal-length byte encoding for `BigInt` (spec §6).
//!
//! Zero encodes as a single `0x00` byte; every other value has no leading
//! zero byte. Round-tripping through [`encode`]/[`decode`] must be exact —
//! this is Property 4 (serialization round-trip) applied to the scalar
//! level that every wire struct in `partial.rs` builds on.

use curv::arithmetic::traits::*;
use curv::BigInt;

pub fn encode(value: &BigInt) -> Vec<u8> {
    if value == &BigInt::zero() {
        return vec![0u8];
    }
    value.to_bytes()
}

pub fn decode(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_bytes(bytes)
}

pub fn to_hex(value: &BigInt) -> String {
    hex::encode(encode(value))
}

pub fn from_hex(s: &str) -> Result<BigInt, hex::FromHexError> {
    hex::decode(s).map(|bytes| decode(&bytes))
}

/// `serde(with = "crate::codec::serde_bigint")` helper: encodes a `BigInt`
/// field as a hex string on the wire, matching spec §6's "bigint hex
/// strings" wire format for partial decryptions.
pub mod serde_bigint {
    use super::{decode, encode};
    use curv::BigInt;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(encode(value)).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Ok(decode(&bytes))
    }
}

/// Same, for a `Vec<BigInt>` field.
pub mod serde_bigint_vec {
    use super::{decode, encode};
    use curv::BigInt;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[BigInt], serializer: S) -> Result<S::Ok, S::Error> {
        let hexed: Vec<String> = values.iter().map(|v| hex::encode(encode(v))).collect();
        hexed.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigInt>, D::Error> {
        let hexed = Vec::<String>::deserialize(deserializer)?;
        hexed
            .into_iter()
            .map(|s| {
                hex::decode(&s)
                    .map(|bytes| decode(&bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_round_trips_as_single_byte() {
        let zero = BigInt::zero();
        let encoded = encode(&zero);
        assert_eq!(encoded, vec![0u8]);
        assert_eq!(decode(&encoded), zero);
    }

    #[test]
    fn nonzero_round_trips_without_leading_zero() {
        let value = BigInt::from(65536 + 255);
        let encoded = encode(&value);
        assert_ne!(encoded[0], 0u8);
        assert_eq!(decode(&encoded), value);
    }

    #[test]
    fn hex_round_trips() {
        let value = BigInt::from(123_456_789u64);
        let hex_str = to_hex(&value);
        assert_eq!(from_hex(&hex_str).unwrap(), value);
    }
}
