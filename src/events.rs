use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use parking_node_core::{BarrierCommand, BarrierPosition, VehicleEvent};

use crate::constants::{BARRIER_COMMAND_QUEUE_SIZE, VEHICLE_EVENT_QUEUE_SIZE};

/// Detector to broker session
pub static VEHICLE_EVENTS: Channel<CriticalSectionRawMutex, VehicleEvent, VEHICLE_EVENT_QUEUE_SIZE> =
    Channel::new();

/// Broker session to barrier servo
pub static BARRIER_COMMANDS: Channel<
    CriticalSectionRawMutex,
    BarrierCommand,
    BARRIER_COMMAND_QUEUE_SIZE,
> = Channel::new();

/// Latest servo position, reported by the broker session in the node status
pub static BARRIER_POSITION: Signal<CriticalSectionRawMutex, BarrierPosition> = Signal::new();
