//! UEFI GUIDs
//!
//! Stored in their binary form: the first three groups little-endian, the
//! last two big-endian. Text parsing is case-insensitive and display is
//! lowercase.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid([u8; 16]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GuidParseError {
    #[error("Invalid GUID string `{text}'")]
    InvalidString { text: String },

    #[error("Invalid GUID length {length}, expected 16 bytes")]
    InvalidLength { length: usize },
}

impl Guid {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GuidParseError> {
        let array: [u8; 16] = bytes
            .try_into()
            .map_err(|_| GuidParseError::InvalidLength {
                length: bytes.len(),
            })?;
        Ok(Guid(array))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || GuidParseError::InvalidString {
            text: text.to_string(),
        };

        let groups: Vec<&str> = text.split('-').collect();
        let widths = [8, 4, 4, 4, 12];
        if groups.len() != widths.len()
            || groups
                .iter()
                .zip(widths)
                .any(|(g, w)| g.len() != w || !g.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(invalid());
        }

        let time_low = u32::from_str_radix(groups[0], 16).map_err(|_| invalid())?;
        let time_mid = u16::from_str_radix(groups[1], 16).map_err(|_| invalid())?;
        let time_high = u16::from_str_radix(groups[2], 16).map_err(|_| invalid())?;
        let clock_seq = u16::from_str_radix(groups[3], 16).map_err(|_| invalid())?;
        let node = hex::decode(groups[4]).map_err(|_| invalid())?;

        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&time_low.to_le_bytes());
        bytes[4..6].copy_from_slice(&time_mid.to_le_bytes());
        bytes[6..8].copy_from_slice(&time_high.to_le_bytes());
        bytes[8..10].copy_from_slice(&clock_seq.to_be_bytes());
        bytes[10..16].copy_from_slice(&node);
        Ok(Guid(bytes))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{}-{}",
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_le_bytes([b[4], b[5]]),
            u16::from_le_bytes([b[6], b[7]]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16]),
        )
    }
}

impl serde::Serialize for Guid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
