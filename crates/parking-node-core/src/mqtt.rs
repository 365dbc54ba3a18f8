//! MQTT v5 connection to the parking broker.
//!
//! Every wait for an acknowledgement keeps reading packets until the expected
//! one shows up, so PUBLISH packets the broker interleaves (retained messages
//! right after SUBACK, status updates during a publish) reach the message
//! handler instead of failing the call.

use embedded_io_async::{Read, ReadReady, Write};
use heapless::Vec;
use log::{debug, error, info, warn};
use rust_mqtt::{
    client::{
        client_config::{ClientConfig, MqttVersion},
        raw_client::{Event, RawMqttClient},
    },
    packet::v5::{publish_packet::QualityOfService, reason_codes::ReasonCode},
    utils::rng_generator::CountingRng,
};

use crate::config::Config;

/// Maximum number of MQTT v5 properties per packet
pub const MAX_PROPERTIES: usize = 5;
/// Topic filters sent in a single SUBSCRIBE
pub const MAX_SUBSCRIPTIONS: usize = 4;

#[derive(Debug, PartialEq)]
pub enum Error {
    ConnectionFailed(ReasonCode),
    SubscribeFailed(ReasonCode),
    PublishMessageFailed(ReasonCode),
    PingFailed(ReasonCode),
    ReceiveFailed(ReasonCode),
    Disconnected(ReasonCode),
    TooManyTopics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ack {
    Suback(u16),
    Puback(u16),
    Pingresp,
}

pub struct Mqtt<'a, T>
where
    T: Read + Write + ReadReady,
{
    client: RawMqttClient<'a, T, MAX_PROPERTIES, CountingRng>,
}

impl<'a, T> Mqtt<'a, T>
where
    T: Read + Write + ReadReady,
{
    /// Send CONNECT with the configured client id and credentials, and wait
    /// for the broker's CONNACK.
    pub async fn connect(
        transport: T,
        tx_buffer: &'a mut [u8],
        rx_buffer: &'a mut [u8],
        config: &Config<'a>,
        seed: u64,
    ) -> Result<Self, Error> {
        let mut client_config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(seed));
        client_config.add_max_subscribe_qos(QualityOfService::QoS1);
        client_config.add_client_id(config.device_id);
        client_config.keep_alive = config.mqtt_keep_alive_seconds;
        client_config.max_packet_size = rx_buffer.len() as u32;

        if let Some(username) = config.mqtt_username {
            client_config.add_username(username);
        }
        if let Some(password) = config.mqtt_password {
            client_config.add_password(password);
        }

        let tx_len = tx_buffer.len();
        let rx_len = rx_buffer.len();
        let mut client =
            RawMqttClient::new(transport, tx_buffer, tx_len, rx_buffer, rx_len, client_config);

        client
            .connect_to_broker()
            .await
            .map_err(Error::ConnectionFailed)?;

        let acked = match client.poll::<MAX_SUBSCRIPTIONS>().await {
            Ok(Event::Connack) => Ok(()),
            Ok(Event::Disconnect(reason)) | Err(reason) => Err(reason),
            Ok(_) => Err(ReasonCode::ProtocolError),
        };
        if let Err(reason) = acked {
            error!("MQTT connect failed: {:?}", reason);
            return Err(Error::ConnectionFailed(reason));
        }

        info!("MQTT connected to broker as {:?}", config.device_id);
        Ok(Self { client })
    }

    /// Subscribe to all `topics` with one SUBSCRIBE and wait for its SUBACK.
    pub async fn subscribe<F>(&mut self, topics: &[&str], on_message: &mut F) -> Result<(), Error>
    where
        F: FnMut(&str, &[u8]),
    {
        let filters: Vec<&str, MAX_SUBSCRIPTIONS> =
            Vec::from_slice(topics).map_err(|_| Error::TooManyTopics)?;

        let id = self
            .client
            .subscribe_to_topics(&filters)
            .await
            .map_err(Error::SubscribeFailed)?;

        self.wait_for(Ack::Suback(id), on_message)
            .await
            .map_err(|e| {
                error!("Failed to subscribe to {:?}: {:?}", topics, e);
                Error::SubscribeFailed(e)
            })?;

        info!("Subscribed to {:?}", topics);
        Ok(())
    }

    /// Publish with QoS 1, returns once the broker acknowledged the message.
    pub async fn publish<F>(
        &mut self,
        topic: &str,
        payload: &[u8],
        on_message: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(&str, &[u8]),
    {
        let id = self
            .client
            .send_message(topic, payload, QualityOfService::QoS1, false)
            .await
            .map_err(Error::PublishMessageFailed)?;

        self.wait_for(Ack::Puback(id), on_message)
            .await
            .map_err(|e| {
                error!("Failed to publish to {:?}: {:?}", topic, e);
                Error::PublishMessageFailed(e)
            })?;

        debug!("Message published to {:?} and acknowledged", topic);
        Ok(())
    }

    pub async fn ping<F>(&mut self, on_message: &mut F) -> Result<(), Error>
    where
        F: FnMut(&str, &[u8]),
    {
        self.client.send_ping().await.map_err(Error::PingFailed)?;
        self.wait_for(Ack::Pingresp, on_message)
            .await
            .map_err(Error::PingFailed)
    }

    /// Handle one packet if the broker already sent something.
    ///
    /// Returns `false` without reading when nothing is buffered, so callers can
    /// wait on other events in between without cutting a packet in half.
    pub async fn poll_ready<F>(&mut self, on_message: &mut F) -> Result<bool, Error>
    where
        F: FnMut(&str, &[u8]),
    {
        match self
            .client
            .poll_if_ready::<MAX_SUBSCRIPTIONS>()
            .await
            .map_err(Error::ReceiveFailed)?
        {
            None => Ok(false),
            Some(Event::Message(topic, payload)) => {
                on_message(topic, payload);
                Ok(true)
            }
            Some(Event::Disconnect(reason)) => {
                warn!("Broker closed the session: {:?}", reason);
                Err(Error::Disconnected(reason))
            }
            Some(_) => {
                debug!("Ignoring stray acknowledgement");
                Ok(true)
            }
        }
    }

    pub async fn disconnect(mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect failed: {:?}", e);
        }
    }

    async fn wait_for<F>(&mut self, expected: Ack, on_message: &mut F) -> Result<(), ReasonCode>
    where
        F: FnMut(&str, &[u8]),
    {
        loop {
            match self.client.poll::<MAX_SUBSCRIPTIONS>().await? {
                Event::Message(topic, payload) => on_message(topic, payload),
                Event::Suback(id) if expected == Ack::Suback(id) => return Ok(()),
                // No matching subscribers (0x10) is still a successful delivery
                Event::Puback(id, matching) if expected == Ack::Puback(id) => {
                    if !matching {
                        debug!("Message {} has no subscribers yet", id);
                    }
                    return Ok(());
                }
                Event::Pingresp if expected == Ack::Pingresp => return Ok(()),
                Event::Disconnect(reason) => return Err(reason),
                _ => warn!("Unexpected packet while waiting for {:?}", expected),
            }
        }
    }
}
