use core::fmt;

/// Default MQTT broker port (plain TCP)
pub const DEFAULT_MQTT_PORT: u16 = 1883;
/// Default MQTT keep alive, matches the broker side clients
pub const DEFAULT_MQTT_KEEP_ALIVE_SECONDS: u16 = 60;

pub const DEFAULT_DEVICE_ID: &str = "parking-node";

/// Topic the node publishes vehicle presence events to
pub const DEFAULT_TOPIC_VEHICLE: &str = "parking/sensor/vehicle";
/// Topic carrying the parking occupancy summary
pub const DEFAULT_TOPIC_STATUS: &str = "parking/status";
/// Topic the node subscribes to for barrier commands
pub const DEFAULT_TOPIC_BARRIER: &str = "parking/barrier/command";

pub const DEFAULT_DETECTION_THRESHOLD_CM: u16 = 30;
pub const DEFAULT_DETECTION_HYSTERESIS_CM: u16 = 5;
pub const DEFAULT_DETECTION_CONFIRM_SAMPLES: u8 = 3;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 200;

pub const DEFAULT_BARRIER_OPEN_SECONDS: u16 = 5;
pub const DEFAULT_BARRIER_CLOSED_ANGLE: u8 = 0;
pub const DEFAULT_BARRIER_OPEN_ANGLE: u8 = 90;

/// Longest topic name accepted, bounded by the firmware's MQTT buffers
pub const MAX_TOPIC_LEN: usize = 128;
/// 802.11 limits
pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PSK_LEN: usize = 64;
/// DHCP hostname buffer size in the network stack
pub const MAX_DEVICE_ID_LEN: usize = 32;

pub const MAX_SERVO_ANGLE: u8 = 180;

/// Node configuration.
///
/// The firmware gets a `Config<'static>` generated at compile time from
/// `cfg.toml`. The build script validates the same struct before emitting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config<'a> {
    // Device ID (used as DHCP hostname and MQTT client identifier)
    pub device_id: &'a str,

    // Wi-Fi SSID to connect to
    pub wifi_ssid: &'a str,

    // Wi-Fi pre-shared key (password)
    pub wifi_psk: &'a str,

    // MQTT broker hostname or IPv4 address
    pub mqtt_hostname: &'a str,

    // MQTT port (usually 1883)
    pub mqtt_port: u16,

    // MQTT credentials, the broker may accept anonymous clients
    pub mqtt_username: Option<&'a str>,
    pub mqtt_password: Option<&'a str>,

    pub mqtt_keep_alive_seconds: u16,

    // MQTT topic to publish vehicle presence events to
    pub topic_vehicle: &'a str,

    // MQTT topic carrying the parking status
    pub topic_status: &'a str,

    // MQTT topic to receive barrier commands from
    pub topic_barrier: &'a str,

    // A vehicle is present at or below this distance
    pub detection_threshold_cm: u16,

    // Extra distance a vehicle must move away before it counts as gone
    pub detection_hysteresis_cm: u16,

    // Consecutive agreeing samples needed before a state change is reported
    pub detection_confirm_samples: u8,

    // Interval between two distance samples
    pub sample_interval_ms: u32,

    // Time the barrier stays open before closing on its own
    pub barrier_open_seconds: u16,

    // Servo angles in degrees
    pub barrier_closed_angle: u8,
    pub barrier_open_angle: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    Empty(&'static str),
    TooLong(&'static str),
    InvalidTopic(&'static str),
    InvalidPort,
    InvalidDetection(&'static str),
    InvalidAngle(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Empty(field) => write!(f, "`{field}` must not be empty"),
            ConfigError::TooLong(field) => write!(f, "`{field}` is too long"),
            ConfigError::InvalidTopic(field) => write!(
                f,
                "`{field}` is not a valid MQTT topic name (no wildcards, at most {MAX_TOPIC_LEN} bytes)"
            ),
            ConfigError::InvalidPort => write!(f, "`mqtt_port` must not be 0"),
            ConfigError::InvalidDetection(field) => write!(f, "`{field}` must be greater than 0"),
            ConfigError::InvalidAngle(field) => {
                write!(f, "`{field}` must be a distinct angle between 0 and {MAX_SERVO_ANGLE}")
            }
        }
    }
}

impl<'a> Config<'a> {
    /// Configuration with every optional field at its default.
    pub const fn new(
        wifi_ssid: &'a str,
        wifi_psk: &'a str,
        mqtt_hostname: &'a str,
    ) -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
            wifi_ssid,
            wifi_psk,
            mqtt_hostname,
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_username: None,
            mqtt_password: None,
            mqtt_keep_alive_seconds: DEFAULT_MQTT_KEEP_ALIVE_SECONDS,
            topic_vehicle: DEFAULT_TOPIC_VEHICLE,
            topic_status: DEFAULT_TOPIC_STATUS,
            topic_barrier: DEFAULT_TOPIC_BARRIER,
            detection_threshold_cm: DEFAULT_DETECTION_THRESHOLD_CM,
            detection_hysteresis_cm: DEFAULT_DETECTION_HYSTERESIS_CM,
            detection_confirm_samples: DEFAULT_DETECTION_CONFIRM_SAMPLES,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            barrier_open_seconds: DEFAULT_BARRIER_OPEN_SECONDS,
            barrier_closed_angle: DEFAULT_BARRIER_CLOSED_ANGLE,
            barrier_open_angle: DEFAULT_BARRIER_OPEN_ANGLE,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("device_id", self.device_id)?;
        max_len("device_id", self.device_id, MAX_DEVICE_ID_LEN)?;
        non_empty("wifi_ssid", self.wifi_ssid)?;
        max_len("wifi_ssid", self.wifi_ssid, MAX_SSID_LEN)?;
        non_empty("wifi_psk", self.wifi_psk)?;
        max_len("wifi_psk", self.wifi_psk, MAX_PSK_LEN)?;
        non_empty("mqtt_hostname", self.mqtt_hostname)?;

        if self.mqtt_port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if let Some(username) = self.mqtt_username {
            non_empty("mqtt_username", username)?;
        }

        topic("topic_vehicle", self.topic_vehicle)?;
        topic("topic_status", self.topic_status)?;
        topic("topic_barrier", self.topic_barrier)?;

        if self.detection_threshold_cm == 0 {
            return Err(ConfigError::InvalidDetection("detection_threshold_cm"));
        }
        if self.detection_confirm_samples == 0 {
            return Err(ConfigError::InvalidDetection("detection_confirm_samples"));
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::InvalidDetection("sample_interval_ms"));
        }

        if self.barrier_closed_angle > MAX_SERVO_ANGLE {
            return Err(ConfigError::InvalidAngle("barrier_closed_angle"));
        }
        if self.barrier_open_angle > MAX_SERVO_ANGLE
            || self.barrier_open_angle == self.barrier_closed_angle
        {
            return Err(ConfigError::InvalidAngle("barrier_open_angle"));
        }

        Ok(())
    }

    /// Broker address octets when the hostname is a dotted-quad literal.
    pub fn broker_ipv4(&self) -> Option<[u8; 4]> {
        parse_ipv4(self.mqtt_hostname)
    }
}

/// Topic names used for publishing must not contain wildcards.
pub fn is_valid_topic_name(topic: &str) -> bool {
    !topic.is_empty()
        && topic.len() <= MAX_TOPIC_LEN
        && !topic.contains(['+', '#', '\0'])
}

pub fn parse_ipv4(s: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = s.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        // u8::from_str accepts a leading '+'
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty(field))
    } else {
        Ok(())
    }
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ConfigError> {
    if value.len() > max {
        Err(ConfigError::TooLong(field))
    } else {
        Ok(())
    }
}

fn topic(field: &'static str, value: &str) -> Result<(), ConfigError> {
    non_empty(field, value)?;
    if is_valid_topic_name(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTopic(field))
    }
}
