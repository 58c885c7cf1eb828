//! ZCL frame codec
//!
//! Covers the subset of the Zigbee Cluster Library the ingestion engine
//! consumes: the frame header, attribute reports and read responses, the
//! IAS Zone commands and the two button command shapes seen on battery
//! remotes.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{DecodeError, Result};
use crate::reader::ByteReader;

/// Cluster identifiers
pub mod cluster {
    pub const POWER_CONFIGURATION: u16 = 0x0001;
    pub const SCENES: u16 = 0x0005;
    pub const ON_OFF: u16 = 0x0006;
    pub const ILLUMINANCE: u16 = 0x0400;
    pub const TEMPERATURE: u16 = 0x0402;
    pub const HUMIDITY: u16 = 0x0405;
    pub const OCCUPANCY: u16 = 0x0406;
    pub const IAS_ZONE: u16 = 0x0500;
    pub const TUYA: u16 = 0xEF00;
}

/// Global (profile-wide) command identifiers
pub mod global {
    pub const READ_ATTRIBUTES_RESPONSE: u8 = 0x01;
    pub const REPORT_ATTRIBUTES: u8 = 0x0A;
    pub const DEFAULT_RESPONSE: u8 = 0x0B;
}

// Frame control bits
const FC_CLUSTER_SPECIFIC: u8 = 0b0000_0001;
const FC_MANUFACTURER_SPECIFIC: u8 = 0b0000_0100;
const FC_SERVER_TO_CLIENT: u8 = 0b0000_1000;
const FC_DISABLE_DEFAULT_RESPONSE: u8 = 0b0001_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Global,
    ClusterSpecific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// `[frame_control:1][manufacturer:2 LE, optional][seq:1][command:1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZclHeader {
    pub frame_type: FrameType,
    pub direction: Direction,
    pub disable_default_response: bool,
    pub manufacturer_code: Option<u16>,
    pub seq: u8,
    pub command: u8,
}

impl ZclHeader {
    /// Header for a cluster-specific command sent by the coordinator
    pub fn cluster_command(seq: u8, command: u8) -> Self {
        Self {
            frame_type: FrameType::ClusterSpecific,
            direction: Direction::ClientToServer,
            disable_default_response: true,
            manufacturer_code: None,
            seq,
            command,
        }
    }

    /// Parse the header and return it with the remaining command body
    pub fn parse(buf: &[u8]) -> Result<(Self, &[u8])> {
        let mut r = ByteReader::new(buf);
        let fc = r.u8()?;
        let manufacturer_code = if fc & FC_MANUFACTURER_SPECIFIC != 0 {
            Some(r.u16_le()?)
        } else {
            None
        };
        let seq = r.u8()?;
        let command = r.u8()?;

        let header = Self {
            frame_type: if fc & FC_CLUSTER_SPECIFIC != 0 {
                FrameType::ClusterSpecific
            } else {
                FrameType::Global
            },
            direction: if fc & FC_SERVER_TO_CLIENT != 0 {
                Direction::ServerToClient
            } else {
                Direction::ClientToServer
            },
            disable_default_response: fc & FC_DISABLE_DEFAULT_RESPONSE != 0,
            manufacturer_code,
            seq,
            command,
        };
        Ok((header, r.rest()))
    }

    pub fn frame_control(&self) -> u8 {
        let mut fc = 0;
        if self.frame_type == FrameType::ClusterSpecific {
            fc |= FC_CLUSTER_SPECIFIC;
        }
        if self.manufacturer_code.is_some() {
            fc |= FC_MANUFACTURER_SPECIFIC;
        }
        if self.direction == Direction::ServerToClient {
            fc |= FC_SERVER_TO_CLIENT;
        }
        if self.disable_default_response {
            fc |= FC_DISABLE_DEFAULT_RESPONSE;
        }
        fc
    }

    pub fn encoded_len(&self) -> usize {
        if self.manufacturer_code.is_some() {
            5
        } else {
            3
        }
    }

    pub fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(self.frame_control());
        if let Some(code) = self.manufacturer_code {
            out.put_u16_le(code);
        }
        out.put_u8(self.seq);
        out.put_u8(self.command);
    }

    /// Header followed by `body` as one frame
    pub fn frame(&self, body: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(self.encoded_len() + body.len());
        self.write_to(&mut out);
        out.put_slice(body);
        out.freeze()
    }

    pub fn is_global(&self) -> bool {
        self.frame_type == FrameType::Global
    }
}

// ============================================================================
// Attribute values
// ============================================================================

/// ZCL data type identifiers understood by [`parse_attribute_report`]
pub mod data_type {
    pub const BOOL: u8 = 0x10;
    pub const BITMAP8: u8 = 0x18;
    pub const BITMAP16: u8 = 0x19;
    pub const UINT8: u8 = 0x20;
    pub const UINT16: u8 = 0x21;
    pub const UINT32: u8 = 0x23;
    pub const INT8: u8 = 0x28;
    pub const INT16: u8 = 0x29;
    pub const INT32: u8 = 0x2B;
    pub const ENUM8: u8 = 0x30;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZclValue {
    Bool(bool),
    Unsigned(u32),
    Signed(i32),
    Enum8(u8),
    Bitmap(u16),
}

impl ZclValue {
    fn read(type_id: u8, r: &mut ByteReader<'_>) -> Result<Self> {
        use data_type::*;
        let value = match type_id {
            BOOL => match r.u8()? {
                0 => Self::Bool(false),
                1 => Self::Bool(true),
                // 0xFF is the ZCL "invalid" marker
                other => {
                    return Err(DecodeError::payload(
                        "zcl bool",
                        format!("value 0x{:02X} is not 0 or 1", other),
                    ))
                },
            },
            BITMAP8 => Self::Bitmap(u16::from(r.u8()?)),
            BITMAP16 => Self::Bitmap(r.u16_le()?),
            UINT8 => Self::Unsigned(u32::from(r.u8()?)),
            UINT16 => Self::Unsigned(u32::from(r.u16_le()?)),
            UINT32 => Self::Unsigned(r.u32_le()?),
            INT8 => Self::Signed(i32::from(r.u8()? as i8)),
            INT16 => Self::Signed(i32::from(r.u16_le()? as i16)),
            INT32 => Self::Signed(r.u32_le()? as i32),
            ENUM8 => Self::Enum8(r.u8()?),
            other => return Err(DecodeError::InvalidType(other)),
        };
        Ok(value)
    }

    fn data_type(self) -> u8 {
        match self {
            Self::Bool(_) => data_type::BOOL,
            Self::Unsigned(_) => data_type::UINT32,
            Self::Signed(_) => data_type::INT32,
            Self::Enum8(_) => data_type::ENUM8,
            Self::Bitmap(_) => data_type::BITMAP16,
        }
    }

    fn write_to(self, out: &mut BytesMut) {
        match self {
            Self::Bool(b) => out.put_u8(u8::from(b)),
            Self::Unsigned(v) => out.put_u32_le(v),
            Self::Signed(v) => out.put_i32_le(v),
            Self::Enum8(v) => out.put_u8(v),
            Self::Bitmap(v) => out.put_u16_le(v),
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Bool(b) => i64::from(b),
            Self::Unsigned(v) => i64::from(v),
            Self::Signed(v) => i64::from(v),
            Self::Enum8(v) => i64::from(v),
            Self::Bitmap(v) => i64::from(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRecord {
    pub attribute: u16,
    pub value: ZclValue,
}

/// Parse a Report Attributes body: `[attr:2 LE][type:1][value]...`
pub fn parse_attribute_report(body: &[u8]) -> Result<Vec<AttributeRecord>> {
    let mut r = ByteReader::new(body);
    let mut records = Vec::new();
    while r.remaining() > 0 {
        let attribute = r.u16_le()?;
        let data_type = r.u8()?;
        let value = ZclValue::read(data_type, &mut r)?;
        records.push(AttributeRecord { attribute, value });
    }
    Ok(records)
}

/// Parse a Read Attributes Response body: `[attr:2 LE][status:1]([type:1][value])...`
///
/// Records with a non-success status carry no value and are skipped.
pub fn parse_read_attributes_response(body: &[u8]) -> Result<Vec<AttributeRecord>> {
    let mut r = ByteReader::new(body);
    let mut records = Vec::new();
    while r.remaining() > 0 {
        let attribute = r.u16_le()?;
        let status = r.u8()?;
        if status != 0 {
            debug!("Attribute 0x{:04X} read failed, status 0x{:02X}", attribute, status);
            continue;
        }
        let data_type = r.u8()?;
        let value = ZclValue::read(data_type, &mut r)?;
        records.push(AttributeRecord { attribute, value });
    }
    Ok(records)
}

/// Build a Report Attributes frame (device side); used by tests and the replay tool
pub fn encode_attribute_report(seq: u8, records: &[AttributeRecord]) -> Bytes {
    let header = ZclHeader {
        frame_type: FrameType::Global,
        direction: Direction::ServerToClient,
        disable_default_response: true,
        manufacturer_code: None,
        seq,
        command: global::REPORT_ATTRIBUTES,
    };
    let mut out = BytesMut::new();
    header.write_to(&mut out);
    for record in records {
        out.put_u16_le(record.attribute);
        out.put_u8(record.value.data_type());
        record.value.write_to(&mut out);
    }
    out.freeze()
}

// ============================================================================
// IAS Zone
// ============================================================================

pub mod ias {
    use super::*;

    pub const STATUS_CHANGE_NOTIFICATION: u8 = 0x00;
    pub const ENROLL_REQUEST: u8 = 0x01;
    pub const ENROLL_RESPONSE: u8 = 0x00;

    pub const ENROLL_SUCCESS: u8 = 0x00;
    pub const DEFAULT_ZONE_ID: u8 = 10;

    /// Zone status bitmap
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ZoneStatus(pub u16);

    impl ZoneStatus {
        pub fn alarm1(self) -> bool {
            self.0 & 0x0001 != 0
        }

        pub fn alarm2(self) -> bool {
            self.0 & 0x0002 != 0
        }

        pub fn tamper(self) -> bool {
            self.0 & 0x0004 != 0
        }

        pub fn battery_low(self) -> bool {
            self.0 & 0x0008 != 0
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusChangeNotification {
        pub status: ZoneStatus,
        pub extended_status: u8,
        pub zone_id: u8,
        pub delay: u16,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnrollRequest {
        pub zone_type: u16,
        pub manufacturer_code: u16,
    }

    /// Server-to-client IAS command
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ZoneCommand {
        StatusChange(StatusChangeNotification),
        EnrollRequest(EnrollRequest),
    }

    /// Decode a cluster-specific IAS Zone command body
    ///
    /// Older firmware omits the trailing `delay` field; it reads as zero.
    pub fn decode_command(command: u8, body: &[u8]) -> Result<ZoneCommand> {
        let mut r = ByteReader::new(body);
        match command {
            STATUS_CHANGE_NOTIFICATION => {
                let status = ZoneStatus(r.u16_le()?);
                let extended_status = r.u8()?;
                let zone_id = r.u8()?;
                let delay = if r.remaining() >= 2 { r.u16_le()? } else { 0 };
                Ok(ZoneCommand::StatusChange(StatusChangeNotification {
                    status,
                    extended_status,
                    zone_id,
                    delay,
                }))
            },
            ENROLL_REQUEST => Ok(ZoneCommand::EnrollRequest(EnrollRequest {
                zone_type: r.u16_le()?,
                manufacturer_code: r.u16_le()?,
            })),
            other => Err(DecodeError::UnsupportedCommand(other)),
        }
    }

    /// Full ZCL frame for a successful Zone Enroll Response
    pub fn encode_enroll_response(seq: u8, zone_id: u8) -> Bytes {
        ZclHeader::cluster_command(seq, ENROLL_RESPONSE).frame(&[ENROLL_SUCCESS, zone_id])
    }
}

// ============================================================================
// Button commands
// ============================================================================

pub mod button {
    use super::*;

    /// Tuya press command on the on/off cluster
    pub const TUYA_PRESS: u8 = 0xFD;
    /// Scenes cluster Recall Scene
    pub const SCENE_RECALL: u8 = 0x05;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PressKind {
        Single,
        Double,
        Long,
    }

    impl PressKind {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Single => "single",
                Self::Double => "double",
                Self::Long => "long",
            }
        }

        pub fn code(self) -> u8 {
            match self {
                Self::Single => 0,
                Self::Double => 1,
                Self::Long => 2,
            }
        }
    }

    /// Decode the `0xFD` press body `[press:1]`
    pub fn decode_press(body: &[u8]) -> Result<PressKind> {
        let mut r = ByteReader::new(body);
        match r.u8()? {
            0 => Ok(PressKind::Single),
            1 => Ok(PressKind::Double),
            2 => Ok(PressKind::Long),
            other => Err(DecodeError::payload(
                "press",
                format!("unknown press kind {}", other),
            )),
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SceneRecall {
        pub group: u16,
        pub scene: u8,
    }

    /// Decode a Recall Scene body `[group:2 LE][scene:1]`
    pub fn decode_scene_recall(body: &[u8]) -> Result<SceneRecall> {
        let mut r = ByteReader::new(body);
        Ok(SceneRecall {
            group: r.u16_le()?,
            scene: r.u8()?,
        })
    }
}
