//! Capability negotiation
//!
//! Run once per device at initialisation against the endpoint/cluster
//! catalog the transport discovered. Exactly one telemetry path is chosen;
//! frames outside the accepted `(endpoint, cluster)` pairs are dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zigsense_codec::cluster;

use crate::error::{IngestError, Result};

/// One endpoint as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub endpoint: u8,
    #[serde(default)]
    pub input_clusters: Vec<u16>,
}

impl EndpointDescriptor {
    pub fn new(endpoint: u8, input_clusters: impl Into<Vec<u16>>) -> Self {
        Self {
            endpoint,
            input_clusters: input_clusters.into(),
        }
    }

    fn has(&self, cluster_id: u16) -> bool {
        self.input_clusters.contains(&cluster_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryPath {
    /// Vendor datapoints on cluster 0xEF00
    Tuya,
    /// Standard ZCL clusters
    Zcl,
}

/// Clusters the ZCL path understands
const ZCL_CLUSTERS: [u16; 8] = [
    cluster::POWER_CONFIGURATION,
    cluster::TEMPERATURE,
    cluster::HUMIDITY,
    cluster::ILLUMINANCE,
    cluster::OCCUPANCY,
    cluster::IAS_ZONE,
    cluster::ON_OFF,
    cluster::SCENES,
];

/// Button clusters accepted alongside the Tuya path
const TUYA_COMPANION_CLUSTERS: [u16; 2] = [cluster::ON_OFF, cluster::SCENES];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedPaths {
    pub path: TelemetryPath,
    accepted: HashSet<(u8, u16)>,
    pub ias_endpoint: Option<u8>,
    pub tuya_endpoint: Option<u8>,
}

impl NegotiatedPaths {
    pub fn accepts(&self, endpoint: u8, cluster_id: u16) -> bool {
        self.accepted.contains(&(endpoint, cluster_id))
    }

    pub fn accepted_len(&self) -> usize {
        self.accepted.len()
    }
}

/// Pick the telemetry path for a device, failing closed if none fits
///
/// The Tuya path wins whenever an endpoint exposes 0xEF00. Power
/// configuration is then left out, since the same firmware reports battery
/// on a datapoint too and the two would double up.
pub fn negotiate(device_id: &str, endpoints: &[EndpointDescriptor]) -> Result<NegotiatedPaths> {
    let mut accepted = HashSet::new();
    let mut ias_endpoint = None;

    let tuya_endpoint = endpoints
        .iter()
        .find(|ep| ep.has(cluster::TUYA))
        .map(|ep| ep.endpoint);

    let path = if let Some(tuya_ep) = tuya_endpoint {
        accepted.insert((tuya_ep, cluster::TUYA));
        for ep in endpoints {
            for &c in TUYA_COMPANION_CLUSTERS.iter().filter(|&&c| ep.has(c)) {
                accepted.insert((ep.endpoint, c));
            }
            if ias_endpoint.is_none() && ep.has(cluster::IAS_ZONE) {
                accepted.insert((ep.endpoint, cluster::IAS_ZONE));
                ias_endpoint = Some(ep.endpoint);
            }
        }
        TelemetryPath::Tuya
    } else {
        for ep in endpoints {
            for &c in ZCL_CLUSTERS.iter().filter(|&&c| ep.has(c)) {
                if c == cluster::IAS_ZONE {
                    if ias_endpoint.is_some() {
                        continue;
                    }
                    ias_endpoint = Some(ep.endpoint);
                }
                accepted.insert((ep.endpoint, c));
            }
        }
        if accepted.is_empty() {
            debug!(device = %device_id, "Catalog: {:?}", endpoints);
            return Err(IngestError::NoSupportedPath(device_id.to_string()));
        }
        TelemetryPath::Zcl
    };

    info!(
        device = %device_id,
        "Negotiated {:?} path, {} cluster bindings, IAS endpoint {:?}",
        path,
        accepted.len(),
        ias_endpoint
    );
    Ok(NegotiatedPaths {
        path,
        accepted,
        ias_endpoint,
        tuya_endpoint,
    })
}
