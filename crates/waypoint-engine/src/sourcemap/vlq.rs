//! Base64-VLQ codec used by the `mappings` field of Source Map v3.
//!
//! Each value is split into 5-bit groups, least significant first; bit 6 of
//! every base64 digit is the continuation flag and bit 1 of the first group
//! carries the sign.

use thiserror::Error;

const BASE64_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

/// Malformed VLQ input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VlqError {
    #[error("invalid base64 digit '{0}'")]
    InvalidDigit(char),
    #[error("value ends inside a continuation")]
    UnexpectedEnd,
    #[error("value does not fit in 32 bits")]
    Overflow,
}

fn digit_value(c: u8) -> Option<i64> {
    let v = match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(v as i64)
}

/// Append the VLQ encoding of `value` to `out`.
pub fn encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & VLQ_BASE_MASK;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(BASE64_CHARS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode every value of one mapping segment (the text between commas).
pub fn decode_segment(segment: &str) -> Result<Vec<i64>, VlqError> {
    let mut values = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift: u32 = 0;
    let mut in_value = false;

    for byte in segment.bytes() {
        let digit = digit_value(byte).ok_or(VlqError::InvalidDigit(byte as char))?;
        in_value = true;
        value += (digit & VLQ_BASE_MASK) << shift;
        if digit & VLQ_CONTINUATION_BIT != 0 {
            shift += VLQ_BASE_SHIFT;
            if shift > 31 {
                return Err(VlqError::Overflow);
            }
            continue;
        }

        let negative = value & 1 == 1;
        let magnitude = value >> 1;
        values.push(if negative { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
        in_value = false;
    }

    if in_value {
        return Err(VlqError::UnexpectedEnd);
    }
    Ok(values)
}
