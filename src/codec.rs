//! Wire codec for request payloads and response accounts
//!
//! Requests and responses use different layouts. A request is a mode byte
//! followed by per-value groups: mode 0 packs each value as
//! `[integer, hundredths]`, mode 1 as `[integer / 256, integer % 256,
//! hundredths]`. Mode 1 is selected exactly when some integer part needs
//! more than one byte. A response is a plain concatenation of fixed-width
//! little-endian fields described by a [`Schema`]; there is no mode byte.
//!
//! Values are scaled by 100 and rounded once, so a fractional carry
//! (0.999 rounds to 1.00) rolls into the integer part instead of
//! overflowing the single fractional byte.

use thiserror::Error;

use crate::schema::{DecodedResponse, FieldKind, FieldValue, Schema};

/// Request mode byte: every integer part fits a single byte
const MODE_NARROW: u8 = 0;
/// Request mode byte: integer parts are split across two bytes
const MODE_WIDE: u8 = 1;

/// Largest integer part representable by the two-byte wide encoding
const MAX_WIDE_INTEGER: u64 = u16::MAX as u64;

/// Wire format violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("value {value} at index {index} is negative; only non-negative values encode")]
    NegativeValue { index: usize, value: f64 },

    #[error("value at index {index} is not finite")]
    NonFiniteValue { index: usize },

    #[error("integer part of value {value} at index {index} exceeds the two-byte field")]
    IntegerOverflow { index: usize, value: f64 },

    #[error("response length {actual} does not match schema width {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("unknown request mode byte {0}")]
    UnknownMode(u8),

    #[error("request payload length {len} is not a whole number of {group} byte groups")]
    TruncatedPayload { len: usize, group: usize },

    #[error("request payload is empty")]
    EmptyPayload,
}

/// Split a value into its integer part and two-decimal fraction in
/// hundredths, carrying a rounded-up fraction into the integer part.
fn split_value(value: f64) -> (u64, u8) {
    let scaled = (value * 100.0).round() as u64;
    (scaled / 100, (scaled % 100) as u8)
}

/// Encode a sequence of non-negative values as a request payload.
///
/// The mode byte is 1 exactly when some integer part is >= 256.
pub fn encode(values: &[f64]) -> Result<Vec<u8>, CodecError> {
    let mut parts = Vec::with_capacity(values.len());
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(CodecError::NonFiniteValue { index });
        }
        if value < 0.0 {
            return Err(CodecError::NegativeValue { index, value });
        }

        let (whole, frac) = split_value(value);
        if whole > MAX_WIDE_INTEGER {
            return Err(CodecError::IntegerOverflow { index, value });
        }
        parts.push((whole, frac));
    }

    let wide = parts.iter().any(|&(whole, _)| whole >= 256);

    if wide {
        let mut out = Vec::with_capacity(1 + 3 * parts.len());
        out.push(MODE_WIDE);
        for (whole, frac) in parts {
            out.push((whole / 256) as u8);
            out.push((whole % 256) as u8);
            out.push(frac);
        }
        Ok(out)
    } else {
        let mut out = Vec::with_capacity(1 + 2 * parts.len());
        out.push(MODE_NARROW);
        for (whole, frac) in parts {
            out.push(whole as u8);
            out.push(frac);
        }
        Ok(out)
    }
}

/// Parse a request payload back into (integer, hundredths) pairs.
///
/// This is the program-side view of [`encode`]; the client only needs it
/// to check payloads round-trip.
pub fn decode_request(payload: &[u8]) -> Result<Vec<(u32, u8)>, CodecError> {
    let (&mode, body) = payload.split_first().ok_or(CodecError::EmptyPayload)?;

    let group = match mode {
        MODE_NARROW => 2,
        MODE_WIDE => 3,
        other => return Err(CodecError::UnknownMode(other)),
    };
    if body.len() % group != 0 {
        return Err(CodecError::TruncatedPayload {
            len: payload.len(),
            group,
        });
    }

    let values = body
        .chunks_exact(group)
        .map(|chunk| match mode {
            MODE_NARROW => (chunk[0] as u32, chunk[1]),
            _ => (chunk[0] as u32 * 256 + chunk[1] as u32, chunk[2]),
        })
        .collect();
    Ok(values)
}

/// Decode a response account's bytes against a schema.
///
/// The byte length must equal the schema width exactly; fields are read
/// in declaration order as little-endian fixed-width values.
pub fn decode(data: &[u8], schema: &Schema) -> Result<DecodedResponse, CodecError> {
    let expected = schema.byte_len();
    if data.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    let mut offset = 0;
    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let width = field.kind().width();
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&data[offset..offset + width]);

        let value = match field.kind() {
            FieldKind::Float => FieldValue::Float(f32::from_le_bytes(raw)),
            FieldKind::Int => FieldValue::Int(i32::from_le_bytes(raw)),
        };
        fields.push((field.name().to_string(), value));
        offset += width;
    }

    Ok(DecodedResponse::new(fields))
}
