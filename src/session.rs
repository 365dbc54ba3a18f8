//! Long lived broker session: publishes vehicle events and the node status,
//! receives barrier commands and parking status, and keeps the connection
//! alive.

use embassy_futures::select::{select3, Either3};
use embassy_net::Stack;
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};
use esp_hal::rng::Rng;
use log::{debug, error, info, warn};
use parking_node_core::{Inbound, Mqtt, Roles, SessionState};
use static_cell::StaticCell;

use crate::config::CONFIG;
use crate::constants::*;
use crate::events::{BARRIER_COMMANDS, BARRIER_POSITION, VEHICLE_EVENTS};
use crate::transport::Transport;

static RX_BUF: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
static TX_BUF: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
static MQTT_RX_BUF: StaticCell<[u8; MQTT_RX_BUFFER_SIZE]> = StaticCell::new();
static MQTT_TX_BUF: StaticCell<[u8; MQTT_TX_BUFFER_SIZE]> = StaticCell::new();

#[derive(Debug)]
pub enum Error {
    Transport,
    Mqtt,
}

pub struct Session {
    stack: Stack<'static>,
    rx_buf: &'static mut [u8; RX_BUFFER_SIZE],
    tx_buf: &'static mut [u8; TX_BUFFER_SIZE],
    mqtt_rx_buf: &'static mut [u8; MQTT_RX_BUFFER_SIZE],
    mqtt_tx_buf: &'static mut [u8; MQTT_TX_BUFFER_SIZE],
    state: SessionState<'static>,
}

impl Session {
    pub fn new(stack: Stack<'static>) -> Self {
        let roles = Roles {
            detector: cfg!(feature = "detector"),
            barrier: cfg!(feature = "barrier"),
        };

        Self {
            stack,
            rx_buf: RX_BUF.init([0; RX_BUFFER_SIZE]),
            tx_buf: TX_BUF.init([0; TX_BUFFER_SIZE]),
            mqtt_rx_buf: MQTT_RX_BUF.init([0; MQTT_RX_BUFFER_SIZE]),
            mqtt_tx_buf: MQTT_TX_BUF.init([0; MQTT_TX_BUFFER_SIZE]),
            state: SessionState::new(
                &CONFIG,
                roles,
                Duration::from_millis(RETAINED_COMMAND_GRACE_MS),
            ),
        }
    }

    /// Run one connection to the broker until it fails.
    pub async fn run(&mut self) -> Result<(), Error> {
        let transport = Transport::connect(
            self.stack,
            &mut self.rx_buf[..],
            &mut self.tx_buf[..],
            CONFIG.mqtt_hostname,
            CONFIG.mqtt_port,
        )
        .await
        .map_err(|e| {
            error!("Broker transport failed: {:?}", e);
            Error::Transport
        })?;

        let seed = u64::from(Rng::new().random());
        let mut mqtt = Mqtt::connect(
            transport,
            &mut self.mqtt_tx_buf[..],
            &mut self.mqtt_rx_buf[..],
            &CONFIG,
            seed,
        )
        .await
        .map_err(|_| Error::Mqtt)?;

        let result = serve(&mut mqtt, &mut self.state).await;
        mqtt.disconnect().await;
        result
    }
}

async fn serve<T>(mqtt: &mut Mqtt<'_, T>, state: &mut SessionState<'static>) -> Result<(), Error>
where
    T: Read + Write + ReadReady,
{
    let topics = state.subscriptions();
    mqtt.subscribe(&topics, &mut |topic: &str, payload: &[u8]| {
        dispatch(state, topic, payload)
    })
    .await
    .map_err(|_| Error::Mqtt)?;
    state.on_subscribed(Instant::now());

    publish_status(mqtt, state).await?;
    // Retry whatever the previous session could not deliver
    publish_pending(mqtt, state).await?;

    let ping_interval = Duration::from_secs(u64::from((CONFIG.mqtt_keep_alive_seconds / 2).max(1)));
    let mut last_sent = Instant::now();

    loop {
        // Only whole packets are read, waiting below never splits one
        while mqtt
            .poll_ready(&mut |topic: &str, payload: &[u8]| dispatch(state, topic, payload))
            .await
            .map_err(|e| {
                error!("MQTT receive failed: {:?}", e);
                Error::Mqtt
            })?
        {}

        if last_sent.elapsed() >= ping_interval {
            mqtt.ping(&mut |topic: &str, payload: &[u8]| dispatch(state, topic, payload))
                .await
                .map_err(|e| {
                    error!("MQTT ping failed: {:?}", e);
                    Error::Mqtt
                })?;
            debug!("MQTT keep alive");
            last_sent = Instant::now();
        }

        match select3(
            VEHICLE_EVENTS.receive(),
            BARRIER_POSITION.wait(),
            Timer::after(Duration::from_millis(MQTT_POLL_INTERVAL_MS)),
        )
        .await
        {
            Either3::First(event) => {
                state.queue_event(event);
                publish_pending(mqtt, state).await?;
                last_sent = Instant::now();
            }
            Either3::Second(position) => {
                if state.set_barrier(position) {
                    publish_status(mqtt, state).await?;
                    last_sent = Instant::now();
                }
            }
            Either3::Third(()) => {}
        }
    }
}

async fn publish_pending<T>(
    mqtt: &mut Mqtt<'_, T>,
    state: &mut SessionState<'static>,
) -> Result<(), Error>
where
    T: Read + Write + ReadReady,
{
    let Some(event) = state.pending() else {
        return Ok(());
    };

    let mut payload = [0u8; MQTT_PAYLOAD_SIZE];
    let len = match event.encode(&mut payload) {
        Ok(len) => len,
        Err(e) => {
            // Only an undersized buffer fails here, skip the event
            error!("Failed to encode vehicle event {:?}: {:?}", event, e);
            state.event_delivered();
            return Ok(());
        }
    };

    mqtt.publish(
        state.topic_vehicle(),
        &payload[..len],
        &mut |topic: &str, payload: &[u8]| dispatch(state, topic, payload),
    )
    .await
    .map_err(|_| Error::Mqtt)?;
    state.event_delivered();

    info!(
        "Vehicle {} ({:.1} cm) published",
        if event.detected { "detected" } else { "left" },
        event.distance_cm
    );
    Ok(())
}

async fn publish_status<T>(mqtt: &mut Mqtt<'_, T>, state: &SessionState<'static>) -> Result<(), Error>
where
    T: Read + Write + ReadReady,
{
    let status = state.status();
    let mut payload = [0u8; MQTT_PAYLOAD_SIZE];
    let len = match status.encode(&mut payload) {
        Ok(len) => len,
        Err(e) => {
            error!("Failed to encode node status: {:?}", e);
            return Ok(());
        }
    };

    mqtt.publish(
        state.topic_status(),
        &payload[..len],
        &mut |topic: &str, payload: &[u8]| dispatch(state, topic, payload),
    )
    .await
    .map_err(|_| Error::Mqtt)?;
    debug!("Node status published: barrier {:?}", status.barrier);
    Ok(())
}

fn dispatch(state: &SessionState<'_>, topic: &str, payload: &[u8]) {
    debug!("MQTT message on {:?}: {} bytes", topic, payload.len());

    match state.route(topic, payload, Instant::now()) {
        Inbound::Barrier(command) => {
            if BARRIER_COMMANDS.try_send(command).is_err() {
                warn!("Barrier command queue full, dropping {:?}", command.action);
            }
        }
        Inbound::RetainedBarrier(command) => {
            info!("Ignoring retained barrier command {:?}", command.action)
        }
        Inbound::Status(status) if status.is_full() => {
            warn!("Parking full ({} places occupied)", status.occupied)
        }
        Inbound::Status(status) => info!(
            "Parking status: {}/{} places available",
            status.available, status.total
        ),
        Inbound::NodeReport => debug!("Node report on {:?}", topic),
        Inbound::Invalid(e) => warn!("Invalid payload on {:?}: {:?}", topic, e),
        Inbound::Unknown => debug!("Ignoring message on unexpected topic {:?}", topic),
    }
}

#[embassy_executor::task]
pub async fn session_task(mut session: Session) {
    loop {
        match session.run().await {
            Ok(()) => info!("Broker session closed"),
            Err(e) => error!("Broker session error: {:?}", e),
        }
        Timer::after(Duration::from_millis(MQTT_RECONNECT_DELAY_MS)).await;
    }
}
