//! End to end flow of the node logic: echo readings turn into published
//! vehicle events, and server commands drive the barrier.

use embassy_time::{Duration, Instant};
use parking_node_core::{
    config::{Config, DEFAULT_TOPIC_BARRIER, DEFAULT_TOPIC_VEHICLE},
    detector::echo_to_distance_cm,
    Barrier, BarrierCommand, BarrierPosition, PresenceDetector, ServoCalibration,
};

// -----------------------------------------------------------------------------
// Detection side
// -----------------------------------------------------------------------------

#[test]
fn car_arrival_publishes_a_single_detected_event() {
    let config = Config::new("parking-wifi", "secret-psk", "192.168.1.18");
    let mut detector = PresenceDetector::new(
        config.detection_threshold_cm,
        config.detection_hysteresis_cm,
        config.detection_confirm_samples,
    );

    // Empty lane (~170 cm) then a car stopping at ~17 cm
    let echoes_us = [10_000u64, 10_000, 1_000, 1_000, 1_000, 1_000, 1_000];
    let mut published = Vec::new();
    for echo in echoes_us {
        let reading = echo_to_distance_cm(Duration::from_micros(echo));
        if let Some(event) = detector.update(reading) {
            let mut buf = [0u8; 64];
            let len = event.encode(&mut buf).unwrap();
            published.push(String::from_utf8(buf[..len].to_vec()).unwrap());
        }
    }

    assert_eq!(config.topic_vehicle, DEFAULT_TOPIC_VEHICLE);
    assert_eq!(published.len(), 1);
    assert!(published[0].starts_with(r#"{"detected":true,"distance_cm":17."#));
}

#[test]
fn car_leaving_out_of_range_publishes_departure() {
    let mut detector = PresenceDetector::new(30, 5, 2);
    let readings = [Some(12.0), Some(12.0), None, None];

    let events: Vec<_> = readings
        .into_iter()
        .filter_map(|reading| detector.update(reading))
        .collect();

    assert_eq!(events.len(), 2);
    assert!(events[0].detected);
    assert!(!events[1].detected);
}

// -----------------------------------------------------------------------------
// Barrier side
// -----------------------------------------------------------------------------

#[test]
fn server_commands_drive_servo_angles() {
    let config = Config::new("parking-wifi", "secret-psk", "192.168.1.18");
    let servo = ServoCalibration::default();
    let mut barrier = Barrier::new(Duration::from_secs(config.barrier_open_seconds.into()));

    let angle_for = |position: BarrierPosition| match position {
        BarrierPosition::Open => config.barrier_open_angle,
        BarrierPosition::Closed => config.barrier_closed_angle,
    };

    assert_eq!(config.topic_barrier, DEFAULT_TOPIC_BARRIER);

    let open = BarrierCommand::decode(br#"{"action": "open", "available": 2}"#).unwrap();
    let position = barrier.apply(&open, Instant::from_secs(100)).unwrap();
    assert_eq!(servo.pulse_for_angle(angle_for(position)), 1500);

    let full = BarrierCommand::decode(br#"{"action": "stay_closed"}"#).unwrap();
    assert_eq!(barrier.apply(&full, Instant::from_secs(101)), None);

    let position = barrier.poll(Instant::from_secs(105)).unwrap();
    assert_eq!(servo.pulse_for_angle(angle_for(position)), 500);
}
