//! Tuya cluster `0xEF00` envelope
//!
//! The ZCL command id selects the Tuya command; data-carrying commands have
//! a body of `[seq:2 BE][dp records...]`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::dp::{self, Datapoint};
use crate::error::Result;
use crate::reader::ByteReader;
use crate::zcl::{Direction, FrameType, ZclHeader};

/// Length field value of a time sync response body
pub const TIME_SYNC_PAYLOAD_LEN: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuyaCommand {
    DataRequest,
    DataResponse,
    DataReport,
    DataQuery,
    StatusReport,
    McuVersionResponse,
    TimeSync,
    Other(u8),
}

impl TuyaCommand {
    pub fn code(self) -> u8 {
        match self {
            Self::DataRequest => 0x00,
            Self::DataResponse => 0x01,
            Self::DataReport => 0x02,
            Self::DataQuery => 0x03,
            Self::StatusReport => 0x06,
            Self::McuVersionResponse => 0x11,
            Self::TimeSync => 0x24,
            Self::Other(code) => code,
        }
    }

    /// Whether the body carries datapoint records reported by the device
    pub fn carries_datapoints(self) -> bool {
        matches!(
            self,
            Self::DataResponse | Self::DataReport | Self::StatusReport
        )
    }
}

impl From<u8> for TuyaCommand {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::DataRequest,
            0x01 => Self::DataResponse,
            0x02 => Self::DataReport,
            0x03 => Self::DataQuery,
            0x06 => Self::StatusReport,
            0x11 => Self::McuVersionResponse,
            0x24 => Self::TimeSync,
            other => Self::Other(other),
        }
    }
}

/// Decoded device-to-host Tuya message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuyaMessage {
    Datapoints {
        command: TuyaCommand,
        seq: u16,
        datapoints: Vec<Datapoint>,
    },
    TimeSyncRequest,
    McuVersion {
        seq: u16,
        version: u8,
    },
    Other(TuyaCommand),
}

/// Decode the body of a Tuya cluster command
pub fn decode_message(command: u8, body: &[u8]) -> Result<TuyaMessage> {
    let command = TuyaCommand::from(command);
    if command.carries_datapoints() {
        let mut r = ByteReader::new(body);
        let seq = r.u16_be()?;
        let datapoints = dp::decode(r.rest())?;
        return Ok(TuyaMessage::Datapoints {
            command,
            seq,
            datapoints,
        });
    }

    match command {
        TuyaCommand::TimeSync => Ok(TuyaMessage::TimeSyncRequest),
        TuyaCommand::McuVersionResponse => {
            let mut r = ByteReader::new(body);
            Ok(TuyaMessage::McuVersion {
                seq: r.u16_be()?,
                version: r.u8()?,
            })
        },
        other => Ok(TuyaMessage::Other(other)),
    }
}

/// Body answering a time sync request: `[len=8:2 BE][utc:4 BE][local:4 BE]`
pub fn time_sync_payload(utc_secs: u32, local_secs: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(10);
    out.put_u16(TIME_SYNC_PAYLOAD_LEN);
    out.put_u32(utc_secs);
    out.put_u32(local_secs);
    out.freeze()
}

/// Full ZCL frame answering a time sync request
pub fn time_sync_frame(zcl_seq: u8, utc_secs: u32, local_secs: u32) -> Bytes {
    ZclHeader::cluster_command(zcl_seq, TuyaCommand::TimeSync.code())
        .frame(&time_sync_payload(utc_secs, local_secs))
}

/// Build a device-side data frame carrying `datapoints`
pub fn encode_data_frame(
    command: TuyaCommand,
    zcl_seq: u8,
    seq: u16,
    datapoints: &[Datapoint],
) -> Bytes {
    let header = ZclHeader {
        frame_type: FrameType::ClusterSpecific,
        direction: Direction::ServerToClient,
        disable_default_response: true,
        manufacturer_code: None,
        seq: zcl_seq,
        command: command.code(),
    };
    let records = dp::encode_all(datapoints);
    let mut out = BytesMut::with_capacity(header.encoded_len() + 2 + records.len());
    header.write_to(&mut out);
    out.put_u16(seq);
    out.put_slice(&records);
    out.freeze()
}
