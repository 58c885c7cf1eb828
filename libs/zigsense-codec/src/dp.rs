//! Datapoint TLV records
//!
//! Frame layout is a repetition of `[id:1][type:1][len:2 BE][payload:len]`.
//! Decoding is atomic: a single bad record fails the whole frame.

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::{DecodeError, Result};

/// Size of the fixed record header (`id`, `type`, `len`)
pub const RECORD_HEADER_LEN: usize = 4;

/// Declared payload type of a datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DpType {
    Raw = 0x00,
    Bool = 0x01,
    Value = 0x02,
    String = 0x03,
    Enum = 0x04,
    Bitmap = 0x05,
}

impl DpType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Bool => "bool",
            Self::Value => "value",
            Self::String => "string",
            Self::Enum => "enum",
            Self::Bitmap => "bitmap",
        }
    }
}

impl TryFrom<u8> for DpType {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(Self::Raw),
            0x01 => Ok(Self::Bool),
            0x02 => Ok(Self::Value),
            0x03 => Ok(Self::String),
            0x04 => Ok(Self::Enum),
            0x05 => Ok(Self::Bitmap),
            other => Err(DecodeError::InvalidType(other)),
        }
    }
}

impl std::fmt::Display for DpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of a datapoint payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DpValue<'a> {
    Raw(&'a [u8]),
    Bool(bool),
    Value(i32),
    String(Cow<'a, str>),
    Enum(u8),
    Bitmap(&'a [u8]),
}

impl DpValue<'_> {
    /// Integer view for numeric payload kinds
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Value(v) => Some(i64::from(*v)),
            Self::Enum(v) => Some(i64::from(*v)),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

/// One decoded datapoint
///
/// Instances are only obtainable through [`decode`] or the validating
/// constructors, so the payload always matches the declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datapoint {
    id: u8,
    dp_type: DpType,
    payload: Bytes,
}

impl Datapoint {
    /// Build a datapoint from raw parts, applying the same checks as [`decode`]
    pub fn new(id: u8, dp_type: DpType, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > usize::from(u16::MAX) {
            return Err(DecodeError::payload(
                dp_type.as_str(),
                format!("{} bytes exceeds the 16-bit length field", payload.len()),
            ));
        }
        validate_payload(dp_type, &payload)?;
        Ok(Self {
            id,
            dp_type,
            payload,
        })
    }

    pub fn bool(id: u8, value: bool) -> Self {
        Self {
            id,
            dp_type: DpType::Bool,
            payload: Bytes::copy_from_slice(&[u8::from(value)]),
        }
    }

    pub fn value(id: u8, value: i32) -> Self {
        Self {
            id,
            dp_type: DpType::Value,
            payload: Bytes::copy_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn enumeration(id: u8, value: u8) -> Self {
        Self {
            id,
            dp_type: DpType::Enum,
            payload: Bytes::copy_from_slice(&[value]),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn dp_type(&self) -> DpType {
        self.dp_type
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Interpret the payload according to the declared type
    pub fn value_view(&self) -> DpValue<'_> {
        let p = &self.payload[..];
        match self.dp_type {
            DpType::Raw => DpValue::Raw(p),
            DpType::Bool => DpValue::Bool(p.first().is_some_and(|b| *b != 0)),
            DpType::Value => DpValue::Value(
                <[u8; 4]>::try_from(p)
                    .map(i32::from_be_bytes)
                    .unwrap_or_default(),
            ),
            DpType::String => DpValue::String(String::from_utf8_lossy(p)),
            DpType::Enum => DpValue::Enum(p.first().copied().unwrap_or_default()),
            DpType::Bitmap => DpValue::Bitmap(p),
        }
    }

    /// Encoded length of this record including the header
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + self.payload.len()
    }

    fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(self.id);
        out.put_u8(self.dp_type as u8);
        out.put_u16(self.payload.len() as u16);
        out.put_slice(&self.payload);
    }
}

fn validate_payload(dp_type: DpType, payload: &[u8]) -> Result<()> {
    match dp_type {
        DpType::Bool => match payload {
            [0] | [1] => Ok(()),
            [other] => Err(DecodeError::payload(
                "bool",
                format!("value {} is not 0 or 1", other),
            )),
            _ => Err(DecodeError::payload(
                "bool",
                format!("expected 1 byte, got {}", payload.len()),
            )),
        },
        DpType::Value if payload.len() != 4 => Err(DecodeError::payload(
            "value",
            format!("expected 4 bytes, got {}", payload.len()),
        )),
        DpType::Enum if payload.len() != 1 => Err(DecodeError::payload(
            "enum",
            format!("expected 1 byte, got {}", payload.len()),
        )),
        _ => Ok(()),
    }
}

/// Decode every record in `buf`
///
/// Trailing bytes shorter than a record header are treated as padding.
pub fn decode(buf: &[u8]) -> Result<Vec<Datapoint>> {
    let mut datapoints = Vec::new();
    let mut offset = 0;

    while buf.len() - offset >= RECORD_HEADER_LEN {
        let id = buf[offset];
        let dp_type = DpType::try_from(buf[offset + 1])?;
        let declared = usize::from(u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]));
        let start = offset + RECORD_HEADER_LEN;
        let available = buf.len() - start;

        if declared > available {
            return Err(DecodeError::Truncated {
                id,
                declared,
                available,
            });
        }

        let payload = &buf[start..start + declared];
        validate_payload(dp_type, payload)?;

        if dp_type == DpType::String && std::str::from_utf8(payload).is_err() {
            warn!(
                "DP {} string payload is not UTF-8, raw={}",
                id,
                common::hex::encode_upper(payload)
            );
        }

        datapoints.push(Datapoint {
            id,
            dp_type,
            payload: Bytes::copy_from_slice(payload),
        });
        offset = start + declared;
    }

    if offset < buf.len() {
        debug!("Ignoring {} trailing padding bytes", buf.len() - offset);
    }

    Ok(datapoints)
}

/// Encode a single datapoint record
pub fn encode(dp: &Datapoint) -> Bytes {
    let mut out = BytesMut::with_capacity(dp.encoded_len());
    dp.write_to(&mut out);
    out.freeze()
}

/// Encode several records back to back
pub fn encode_all<'a>(dps: impl IntoIterator<Item = &'a Datapoint>) -> Bytes {
    let mut out = BytesMut::new();
    for dp in dps {
        dp.write_to(&mut out);
    }
    out.freeze()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_decode_value_record() {
        let dps = decode(&[0x04, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x32]).unwrap();
        assert_eq!(dps.len(), 1);
        assert_eq!(dps[0].id(), 4);
        assert_eq!(dps[0].dp_type(), DpType::Value);
        assert_eq!(dps[0].value_view(), DpValue::Value(50));
    }

    #[test]
    fn test_decode_negative_value() {
        let dps = decode(&[0x18, 0x02, 0x00, 0x04, 0xFF, 0xFF, 0xFF, 0x9C]).unwrap();
        assert_eq!(dps[0].value_view(), DpValue::Value(-100));
    }

    #[test]
    fn test_decode_multiple_records_with_padding() {
        let buf = [
            0x01, 0x01, 0x00, 0x01, 0x01, // DP1 bool true
            0x0E, 0x04, 0x00, 0x01, 0x02, // DP14 enum 2
            0x00, 0x00, // padding
        ];
        let dps = decode(&buf).unwrap();
        assert_eq!(dps.len(), 2);
        assert_eq!(dps[0].value_view(), DpValue::Bool(true));
        assert_eq!(dps[1].value_view(), DpValue::Enum(2));
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert!(decode(&[]).unwrap().is_empty());
        assert!(decode(&[0x01, 0x02, 0x00]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_record_fails_whole_frame() {
        let buf = [
            0x01, 0x01, 0x00, 0x01, 0x01, // valid
            0x04, 0x02, 0x00, 0x04, 0x00, 0x00, // declares 4, has 2
        ];
        assert_eq!(
            decode(&buf),
            Err(DecodeError::Truncated {
                id: 4,
                declared: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert_eq!(
            decode(&[0x01, 0x07, 0x00, 0x01, 0x00]),
            Err(DecodeError::InvalidType(0x07))
        );
    }

    #[test]
    fn test_bool_outside_zero_one_is_decode_error() {
        let err = decode(&[0x01, 0x01, 0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload { kind: "bool", .. }));
    }

    #[test]
    fn test_value_wrong_length_rejected() {
        let err = decode(&[0x04, 0x02, 0x00, 0x02, 0x00, 0x32]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload { kind: "value", .. }));
    }

    #[test]
    #[traced_test]
    fn test_invalid_utf8_string_is_not_fatal() {
        let dps = decode(&[0x10, 0x03, 0x00, 0x02, 0xFF, 0x41]).unwrap();
        assert!(matches!(dps[0].value_view(), DpValue::String(_)));
        assert!(logs_contain("FF41"));
    }

    #[test]
    fn test_encode_matches_wire_layout() {
        let bytes = encode(&Datapoint::value(4, 50));
        assert_eq!(&bytes[..], &[0x04, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x32]);
        let bytes = encode(&Datapoint::bool(1, true));
        assert_eq!(&bytes[..], &[0x01, 0x01, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_round_trip_per_type() {
        let samples = vec![
            Datapoint::bool(1, false),
            Datapoint::value(2, i32::MIN),
            Datapoint::enumeration(3, 255),
            Datapoint::new(4, DpType::Raw, vec![0xDE, 0xAD]).unwrap(),
            Datapoint::new(5, DpType::String, "hello").unwrap(),
            Datapoint::new(6, DpType::Bitmap, vec![0x80, 0x01]).unwrap(),
            Datapoint::new(7, DpType::Raw, Vec::<u8>::new()).unwrap(),
        ];
        for dp in samples {
            assert_eq!(decode(&encode(&dp)).unwrap(), vec![dp.clone()]);
        }
    }

    #[test]
    fn test_constructor_validates_like_decoder() {
        assert!(Datapoint::new(1, DpType::Bool, vec![2u8]).is_err());
        assert!(Datapoint::new(1, DpType::Value, vec![0u8; 3]).is_err());
        assert!(Datapoint::new(1, DpType::Raw, vec![0u8; 70_000]).is_err());
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(Datapoint::value(1, -7).value_view().as_integer(), Some(-7));
        assert_eq!(Datapoint::bool(1, true).value_view().as_integer(), Some(1));
        let raw = Datapoint::new(1, DpType::Raw, vec![1u8]).unwrap();
        assert_eq!(raw.value_view().as_integer(), None);
    }
}
