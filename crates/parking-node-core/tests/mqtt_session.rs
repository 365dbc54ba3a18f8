//! Broker conversations replayed from canned packets: retained messages and
//! status updates the broker interleaves with acknowledgements.

use std::collections::VecDeque;

use embassy_futures::block_on;
use embassy_time::{Duration, Instant};
use embedded_io_async::{ErrorKind, ErrorType, Read, ReadReady, Write};
use parking_node_core::{
    mqtt::{Error, Mqtt},
    payload::BarrierAction,
    Config, Inbound, Roles, SessionState,
};
use rust_mqtt::packet::v5::reason_codes::ReasonCode;

const CONNACK: &[u8] = &[0x20, 0x03, 0x00, 0x00, 0x00];
const PINGRESP: &[u8] = &[0xD0, 0x00];

/// Broker side of the socket: hands out scripted bytes, records what the
/// client sends.
#[derive(Default)]
struct Broker {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

impl Broker {
    fn scripted(packets: &[&[u8]]) -> Self {
        Self {
            inbound: packets.iter().flat_map(|p| p.iter().copied()).collect(),
            outbound: Vec::new(),
        }
    }
}

impl ErrorType for Broker {
    type Error = ErrorKind;
}

impl Read for Broker {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for Broker {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl ReadReady for Broker {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        Ok(!self.inbound.is_empty())
    }
}

fn suback(id: u16, granted: usize) -> Vec<u8> {
    let mut packet = vec![0x90, (3 + granted) as u8];
    packet.extend_from_slice(&id.to_be_bytes());
    packet.push(0x00);
    packet.extend(std::iter::repeat(0x01).take(granted));
    packet
}

fn puback(id: u16, reason: u8) -> Vec<u8> {
    let mut packet = vec![0x40, 0x03];
    packet.extend_from_slice(&id.to_be_bytes());
    packet.push(reason);
    packet
}

/// QoS 0 PUBLISH, small enough for a one byte remaining length.
fn publish(topic: &str, payload: &[u8], retain: bool) -> Vec<u8> {
    let remaining = 2 + topic.len() + 1 + payload.len();
    assert!(remaining < 128);
    let mut packet = vec![if retain { 0x31 } else { 0x30 }, remaining as u8];
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.push(0x00);
    packet.extend_from_slice(payload);
    packet
}

fn config() -> Config<'static> {
    Config::new("parking-wifi", "secret-psk", "192.168.1.18")
}

#[test]
fn publish_without_subscribers_is_acknowledged() {
    let mut broker = Broker::scripted(&[CONNACK, &puback(1, 0x10)]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);
    let config = config();

    let result: Result<(), Error> = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        mqtt.publish(
            "parking/sensor/vehicle",
            br#"{"detected":true,"distance_cm":12.5}"#,
            &mut |_: &str, _: &[u8]| {},
        )
        .await
    });

    assert_eq!(result, Ok(()));
    // CONNECT then PUBLISH with QoS 1
    assert_eq!(broker.outbound[0], 0x10);
    assert!(broker.outbound.iter().any(|b| *b == 0x32));
}

#[test]
fn refused_publish_fails() {
    let mut broker = Broker::scripted(&[CONNACK, &puback(1, 0x87)]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);
    let config = config();

    let result = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        mqtt.publish("parking/sensor/vehicle", b"{}", &mut |_: &str, _: &[u8]| {})
            .await
    });

    assert_eq!(
        result,
        Err(Error::PublishMessageFailed(ReasonCode::NotAuthorized))
    );
}

#[test]
fn retained_command_after_suback_reaches_the_session() {
    let config = config();
    let retained = publish(
        "parking/barrier/command",
        br#"{"action":"open","available":2}"#,
        true,
    );
    let summary = publish(
        "parking/status",
        br#"{"total":4,"available":2,"occupied":2}"#,
        true,
    );
    let mut broker = Broker::scripted(&[CONNACK, &suback(1, 2), &retained, &summary]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);

    let mut state = SessionState::new(
        &config,
        Roles {
            detector: true,
            barrier: true,
        },
        Duration::from_secs(1),
    );
    let subscribed_at = Instant::from_secs(30);
    let mut routed = Vec::new();

    let result: Result<(), Error> = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        let topics = state.subscriptions();
        mqtt.subscribe(&topics, &mut |_: &str, _: &[u8]| {}).await?;
        state.on_subscribed(subscribed_at);

        let now = subscribed_at + Duration::from_millis(50);
        while mqtt
            .poll_ready(&mut |topic: &str, payload: &[u8]| {
                routed.push(state.route(topic, payload, now))
            })
            .await?
        {}
        Ok(())
    });

    assert_eq!(result, Ok(()));
    assert_eq!(routed.len(), 2);
    match &routed[0] {
        Inbound::RetainedBarrier(command) => assert_eq!(command.action, BarrierAction::Open),
        other => panic!("unexpected route {:?}", other),
    }
    assert!(matches!(routed[1], Inbound::Status(_)));
}

#[test]
fn message_before_suback_is_not_lost() {
    let config = config();
    let retained = publish("parking/status", br#"{"total":4,"available":0,"occupied":4}"#, true);
    let mut broker = Broker::scripted(&[CONNACK, &retained, &suback(1, 2)]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);
    let mut topics_seen = Vec::new();

    let result = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        mqtt.subscribe(
            &["parking/barrier/command", "parking/status"],
            &mut |topic: &str, _: &[u8]| topics_seen.push(topic.to_string()),
        )
        .await
    });

    assert_eq!(result, Ok(()));
    assert_eq!(topics_seen, ["parking/status"]);
}

#[test]
fn publish_interleaved_with_status_update() {
    let config = config();
    let status = publish("parking/status", br#"{"total":4,"available":3,"occupied":1}"#, false);
    let mut broker = Broker::scripted(&[CONNACK, &status, &puback(1, 0x00)]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);
    let mut payloads = Vec::new();

    let result = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        mqtt.publish(
            "parking/sensor/vehicle",
            br#"{"detected":false,"distance_cm":0.0}"#,
            &mut |_: &str, payload: &[u8]| payloads.push(payload.to_vec()),
        )
        .await
    });

    assert_eq!(result, Ok(()));
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].starts_with(br#"{"total":4"#));
}

#[test]
fn ping_interleaved_with_barrier_command() {
    let config = config();
    let command = publish("parking/barrier/command", br#"{"action":"close"}"#, false);
    let mut broker = Broker::scripted(&[CONNACK, &command, PINGRESP]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);
    let mut commands = 0;

    let result = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        mqtt.ping(&mut |topic: &str, _: &[u8]| {
            if topic == "parking/barrier/command" {
                commands += 1;
            }
        })
        .await
    });

    assert_eq!(result, Ok(()));
    assert_eq!(commands, 1);
}

#[test]
fn poll_ready_does_not_wait_on_an_idle_socket() {
    let config = config();
    let mut broker = Broker::scripted(&[CONNACK]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);

    let result = block_on(async {
        let mut mqtt = Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0).await?;
        mqtt.poll_ready(&mut |_: &str, _: &[u8]| {}).await
    });

    assert_eq!(result, Ok(false));
}

#[test]
fn refused_connection_is_reported() {
    // CONNACK with reason 0x87 (not authorized)
    let mut broker = Broker::scripted(&[&[0x20, 0x03, 0x00, 0x87, 0x00]]);
    let (mut tx, mut rx) = ([0u8; 256], [0u8; 256]);
    let config = config();

    let result = block_on(Mqtt::connect(&mut broker, &mut tx, &mut rx, &config, 0)).map(|_| ());

    assert_eq!(
        result,
        Err(Error::ConnectionFailed(ReasonCode::NotAuthorized))
    );
}
