//! Hex encoding of opaque call data

use serde::{Deserialize, Deserializer, Serializer};

/// Parse `0x`-prefixed hex call data. `""` and `"0x"` both yield empty data.
pub fn parse_call_data(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let body = input.trim();
    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .unwrap_or(body);
    hex::decode(body)
}

/// Render call data as `0x`-prefixed hex
pub fn format_call_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Serde adapter storing byte payloads as `0x` hex strings
pub mod hex_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_call_data(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_call_data(&s).map_err(serde::de::Error::custom)
    }
}
