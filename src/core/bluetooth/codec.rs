//! Value and UUID encodings used at the transport boundary.
//! Characteristic values travel as base64; UUIDs may be given in the
//! 16/32-bit short form and are expanded against the Bluetooth base UUID.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use uuid::Uuid;

use crate::core::bluetooth::constants::BLUETOOTH_BASE_UUID;
use crate::core::bluetooth::error::BleError;

pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

pub fn decode(value: &str) -> Result<Vec<u8>, BleError> {
    BASE64_STANDARD
        .decode(value.trim())
        .map_err(|e| BleError::Decode(e.to_string()))
}

/// Text rendering of a payload, lossy for non UTF-8 bytes
pub fn to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Little-endian unsigned integer, as GATT encodes numeric values.
/// Returns `None` for empty payloads or payloads wider than 8 bytes.
pub fn to_integer(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// Expands a 16 or 32-bit assigned number into a full 128-bit UUID
pub fn from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Parses `ab25`, `0000ab25` or a full hyphenated UUID.
pub fn parse_uuid(text: &str) -> Result<Uuid, BleError> {
    let text = text.trim().trim_start_matches("0x");
    let is_hex = !text.is_empty() && text.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex && (text.len() == 4 || text.len() == 8) {
        let short = u32::from_str_radix(text, 16).map_err(|e| BleError::Decode(e.to_string()))?;
        return Ok(from_short(short));
    }
    Uuid::parse_str(text).map_err(|e| BleError::Decode(format!("invalid uuid {:?}: {}", text, e)))
}
