//! Broker session decisions: which topics to follow, where incoming messages
//! go, and which vehicle event still has to be delivered.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::barrier::BarrierPosition;
use crate::config::Config;
use crate::mqtt::MAX_SUBSCRIPTIONS;
use crate::payload::{BarrierCommand, NodeStatus, ParkingStatus, PayloadError, VehicleEvent};

/// Hardware the node drives, one Cargo feature each in the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub detector: bool,
    pub barrier: bool,
}

/// Where an incoming message goes.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Barrier(BarrierCommand),
    /// Barrier command replayed by the broker while subscribing
    RetainedBarrier(BarrierCommand),
    Status(ParkingStatus),
    /// Status report of a node, possibly our own echo
    NodeReport,
    Invalid(PayloadError),
    Unknown,
}

pub struct SessionState<'a> {
    device_id: &'a str,
    topic_vehicle: &'a str,
    topic_status: &'a str,
    topic_barrier: &'a str,
    roles: Roles,
    retained_grace: Duration,
    subscribed_at: Option<Instant>,
    // Event taken off the queue but not yet acknowledged by the broker
    pending: Option<VehicleEvent>,
    barrier: Option<BarrierPosition>,
    vehicle_present: Option<bool>,
}

impl<'a> SessionState<'a> {
    pub fn new(config: &Config<'a>, roles: Roles, retained_grace: Duration) -> Self {
        Self {
            device_id: config.device_id,
            topic_vehicle: config.topic_vehicle,
            topic_status: config.topic_status,
            topic_barrier: config.topic_barrier,
            roles,
            retained_grace,
            subscribed_at: None,
            pending: None,
            barrier: roles.barrier.then_some(BarrierPosition::Closed),
            vehicle_present: roles.detector.then_some(false),
        }
    }

    pub fn topic_vehicle(&self) -> &'a str {
        self.topic_vehicle
    }

    pub fn topic_status(&self) -> &'a str {
        self.topic_status
    }

    /// Topic filters for the single SUBSCRIBE sent on every connection.
    pub fn subscriptions(&self) -> Vec<&'a str, MAX_SUBSCRIPTIONS> {
        let mut topics = Vec::new();
        if self.roles.barrier {
            topics.push(self.topic_barrier).ok();
        }
        topics.push(self.topic_status).ok();
        topics
    }

    /// Start of the retained message window, called once SUBACK arrived.
    pub fn on_subscribed(&mut self, now: Instant) {
        self.subscribed_at = Some(now);
    }

    /// Route a PUBLISH received from the broker.
    ///
    /// The server retains its last barrier command, so every (re)subscription
    /// replays it. Commands received before SUBACK or within the grace window
    /// after it count as retained; a genuine command sent in that window is
    /// dropped as well.
    pub fn route(&self, topic: &str, payload: &[u8], now: Instant) -> Inbound {
        if self.roles.barrier && topic == self.topic_barrier {
            match BarrierCommand::decode(payload) {
                Ok(command) if self.in_retained_window(now) => Inbound::RetainedBarrier(command),
                Ok(command) => Inbound::Barrier(command),
                Err(e) => Inbound::Invalid(e),
            }
        } else if topic == self.topic_status {
            if NodeStatus::is_node_report(payload) {
                return Inbound::NodeReport;
            }
            match ParkingStatus::decode(payload) {
                Ok(status) => Inbound::Status(status),
                Err(e) => Inbound::Invalid(e),
            }
        } else {
            Inbound::Unknown
        }
    }

    fn in_retained_window(&self, now: Instant) -> bool {
        match self.subscribed_at {
            Some(at) => now < at + self.retained_grace,
            None => true,
        }
    }

    /// Take a detector event in charge until the broker acknowledges it.
    pub fn queue_event(&mut self, event: VehicleEvent) {
        self.vehicle_present = Some(event.detected);
        self.pending = Some(event);
    }

    /// Event to (re)publish, survives reconnections.
    pub fn pending(&self) -> Option<VehicleEvent> {
        self.pending
    }

    pub fn event_delivered(&mut self) {
        self.pending = None;
    }

    /// Record the barrier position, returns whether it changed.
    pub fn set_barrier(&mut self, position: BarrierPosition) -> bool {
        let changed = self.barrier != Some(position);
        self.barrier = Some(position);
        changed
    }

    pub fn status(&self) -> NodeStatus<'a> {
        NodeStatus {
            node: self.device_id,
            online: true,
            barrier: self.barrier,
            vehicle_present: self.vehicle_present,
        }
    }
}
