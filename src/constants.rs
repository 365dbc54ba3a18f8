/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM, mostly used by the radio driver
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 2048;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 2048;

/// Size of the MQTT client receive buffer for application data
pub const MQTT_RX_BUFFER_SIZE: usize = 1024;
/// Size of the MQTT client transmit buffer for application data
pub const MQTT_TX_BUFFER_SIZE: usize = 1024;
/// Largest JSON body published by the node
pub const MQTT_PAYLOAD_SIZE: usize = 128;
/// Idle wait between two checks of the broker socket
pub const MQTT_POLL_INTERVAL_MS: u64 = 50;

/// Delay before reconnecting to the broker after a session failure
pub const MQTT_RECONNECT_DELAY_MS: u64 = 5_000;

/// Barrier commands received this soon after subscribing are treated as retained
pub const RETAINED_COMMAND_GRACE_MS: u64 = 1_000;

/// TCP socket inactivity timeout
pub const SOCKET_TIMEOUT_SECS: u64 = 90;

/// Timeout for a single Wi-Fi association attempt
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Delay between Wi-Fi reconnection attempts
pub const WIFI_RECONNECT_DELAY_MS: u64 = 5_000;

/// Queued vehicle events waiting for the broker session
pub const VEHICLE_EVENT_QUEUE_SIZE: usize = 4;
/// Queued barrier commands waiting for the servo task
pub const BARRIER_COMMAND_QUEUE_SIZE: usize = 4;

/// Longest echo worth waiting for (~5 m round trip)
pub const ECHO_TIMEOUT_US: u64 = 30_000;
/// HC-SR04 trigger pulse width
pub const TRIGGER_PULSE_US: u32 = 10;

/// LEDC duty resolution used for the barrier servo
pub const SERVO_DUTY_RESOLUTION_BITS: u8 = 14;
