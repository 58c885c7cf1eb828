//! Capture file replay
//!
//! One frame per line: `<device> <endpoint> <cluster> <hex payload>`.
//! Cluster may be decimal or `0x` hex; the payload may contain spaces.
//! Blank lines and `#` comments are skipped.

use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::engine::IngestEngine;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub device_id: String,
    pub endpoint: u8,
    pub cluster: u16,
    pub payload: Bytes,
}

fn parse_u16(text: &str) -> Option<u16> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Parse one capture line; `Ok(None)` for blanks and comments
pub fn parse_capture_line(line_no: usize, line: &str) -> Result<Option<CapturedFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let err = |reason: String| IngestError::Capture {
        line: line_no,
        reason,
    };

    let mut fields = line.splitn(4, char::is_whitespace);
    let device_id = fields.next().unwrap_or_default().to_string();
    let endpoint = fields
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| err("endpoint must be 0-255".to_string()))?;
    let cluster = fields
        .next()
        .and_then(parse_u16)
        .ok_or_else(|| err("cluster must be a 16-bit id".to_string()))?;
    let hex = fields
        .next()
        .ok_or_else(|| err("missing payload".to_string()))?;
    let payload = common::hex::decode(hex).map_err(|e| err(e.to_string()))?;

    Ok(Some(CapturedFrame {
        device_id,
        endpoint,
        cluster,
        payload: Bytes::from(payload),
    }))
}

/// Feed every frame of a capture file into the engine
///
/// Bad lines and frames for unknown devices are logged and skipped.
/// Returns the number of frames delivered.
pub async fn replay_file(engine: &IngestEngine, path: &Path) -> Result<usize> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0;
    let mut delivered = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let frame = match parse_capture_line(line_no, &line) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            },
        };
        match engine.deliver_frame(&frame.device_id, frame.endpoint, frame.cluster, frame.payload) {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Line {}: {}", line_no, e),
        }
        // Let device tasks drain between frames
        tokio::task::yield_now().await;
    }

    info!("Replayed {} frames from {}", delivered, path.display());
    Ok(delivered)
}
