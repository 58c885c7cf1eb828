//! Hex helpers used for frame logging and the replay tool

use std::fmt::Write;

use thiserror::Error;

/// Encode bytes to uppercase hex string
/// Example: [0x12, 0x34, 0xAB] -> "1234AB"
pub fn encode_upper(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("odd number of hex digits ({0})")]
    OddLength(usize),
    #[error("invalid hex digit {digit:?} at offset {offset}")]
    InvalidDigit { digit: char, offset: usize },
}

/// Decode a hex string, ignoring ASCII whitespace and an optional `0x` prefix
///
/// Example: "0x01 01 00 01 01" -> [0x01, 0x01, 0x00, 0x01, 0x01]
pub fn decode(text: &str) -> Result<Vec<u8>, HexError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let digits: Vec<(usize, char)> = body
        .char_indices()
        .filter(|(_, c)| !c.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength(digits.len()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = nibble(pair[0])?;
            let lo = nibble(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn nibble((offset, digit): (usize, char)) -> Result<u8, HexError> {
    digit
        .to_digit(16)
        .map(|v| v as u8)
        .ok_or(HexError::InvalidDigit { digit, offset })
}
