//! Text encoding detection for result logs
//!
//! UEFI tools write UTF-16, Linux tools UTF-8. A byte-order mark decides
//! when present; otherwise a high share of NUL bytes in the first lines
//! means UTF-16, with the NUL position giving the byte order.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
        }
    }
}

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Detect the encoding and the length of any byte-order mark
///
/// Only the first `line_limit` lines, and at most `probe_bytes` bytes, are
/// examined.
pub fn detect_encoding(bytes: &[u8], line_limit: usize, probe_bytes: usize) -> (TextEncoding, usize) {
    if bytes.starts_with(&UTF8_BOM) {
        return (TextEncoding::Utf8, UTF8_BOM.len());
    }
    if bytes.starts_with(&UTF16LE_BOM) {
        return (TextEncoding::Utf16Le, UTF16LE_BOM.len());
    }
    if bytes.starts_with(&UTF16BE_BOM) {
        return (TextEncoding::Utf16Be, UTF16BE_BOM.len());
    }

    let window = probe_window(bytes, line_limit, probe_bytes);
    let len = window.len() - window.len() % 2;
    if len < 4 {
        return (TextEncoding::Utf8, 0);
    }

    let (mut even, mut odd) = (0usize, 0usize);
    for (i, b) in window[..len].iter().enumerate() {
        if *b == 0 {
            if i % 2 == 0 {
                even += 1;
            } else {
                odd += 1;
            }
        }
    }

    // Mostly-ASCII UTF-16 is about half NUL bytes
    if (even + odd) * 5 < len {
        (TextEncoding::Utf8, 0)
    } else if odd >= even {
        (TextEncoding::Utf16Le, 0)
    } else {
        (TextEncoding::Utf16Be, 0)
    }
}

// Bytes up to the end of line `line_limit`, capped at `probe_bytes`
fn probe_window(bytes: &[u8], line_limit: usize, probe_bytes: usize) -> &[u8] {
    let capped = &bytes[..bytes.len().min(probe_bytes)];
    let end = capped
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(line_limit)
        .map(|(i, _)| i + 1)
        .unwrap_or(capped.len());
    &capped[..end]
}

/// Decode with replacement characters for invalid sequences
pub fn decode(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Utf16Le => decode_utf16(bytes, true),
        TextEncoding::Utf16Be => decode_utf16(bytes, false),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
