//! Hardware independent logic of the parking sensor node.
//!
//! Everything here builds for both the ESP32 target and the host, so the
//! firmware's decision making can be unit tested without a board.
#![cfg_attr(not(test), no_std)]

pub mod barrier;
pub mod config;
pub mod detector;
pub mod mqtt;
pub mod payload;
pub mod servo;
pub mod session;

pub use barrier::{Barrier, BarrierPosition};
pub use config::{Config, ConfigError};
pub use detector::{Presence, PresenceDetector};
pub use mqtt::Mqtt;
pub use payload::{
    BarrierAction, BarrierCommand, NodeStatus, ParkingStatus, PayloadError, VehicleEvent,
};
pub use servo::ServoCalibration;
pub use session::{Inbound, Roles, SessionState};
