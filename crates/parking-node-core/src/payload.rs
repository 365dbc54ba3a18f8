//! JSON bodies exchanged with the parking server over MQTT.

use serde::{Deserialize, Serialize};

use crate::barrier::BarrierPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    Encode,
    Decode,
    BufferTooSmall,
}

/// Published on the vehicle topic whenever the detector settles on a new state.
///
/// `{"detected":true,"distance_cm":12.5}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleEvent {
    pub detected: bool,
    pub distance_cm: f32,
}

impl VehicleEvent {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, PayloadError> {
        serde_json_core::to_slice(self, buf).map_err(|e| match e {
            serde_json_core::ser::Error::BufferFull => PayloadError::BufferTooSmall,
            _ => PayloadError::Encode,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierAction {
    Open,
    StayClosed,
    Close,
}

/// Received on the barrier topic.
///
/// The server adds free form fields (`message`, `user`, `method`, `reason`)
/// meant for displays; only the action and the free place count matter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BarrierCommand {
    pub action: BarrierAction,
    pub available: Option<u32>,
}

impl BarrierCommand {
    pub const fn new(action: BarrierAction) -> Self {
        Self {
            action,
            available: None,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        serde_json_core::from_slice::<BarrierCommand>(payload)
            .map(|(command, _)| command)
            .map_err(|_| PayloadError::Decode)
    }
}

/// Parking occupancy summary, retained by the server on the status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ParkingStatus {
    pub total: u32,
    pub available: u32,
    pub occupied: u32,
}

impl ParkingStatus {
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        serde_json_core::from_slice::<ParkingStatus>(payload)
            .map(|(status, _)| status)
            .map_err(|_| PayloadError::Decode)
    }

    pub fn is_full(&self) -> bool {
        self.available == 0
    }
}

/// Published by the node on the status topic, next to the server's retained
/// occupancy summary.
///
/// `{"node":"parking-node","online":true,"barrier":"closed","vehicle_present":false}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeStatus<'a> {
    pub node: &'a str,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barrier: Option<BarrierPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_present: Option<bool>,
}

#[derive(Deserialize)]
struct NodeStatusHeader<'a> {
    #[allow(dead_code)]
    node: &'a str,
}

impl NodeStatus<'_> {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, PayloadError> {
        serde_json_core::to_slice(self, buf).map_err(|e| match e {
            serde_json_core::ser::Error::BufferFull => PayloadError::BufferTooSmall,
            _ => PayloadError::Encode,
        })
    }

    /// Whether a status topic payload is a node report rather than the
    /// server's occupancy summary.
    pub fn is_node_report(payload: &[u8]) -> bool {
        serde_json_core::from_slice::<NodeStatusHeader>(payload).is_ok()
    }
}
