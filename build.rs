use std::{env, error::Error, fs, path::Path};

use parking_node_core::config::{self as defaults, Config};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "cfg.toml";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_device_id")]
    device_id: String,
    wifi_ssid: String,
    wifi_psk: String,
    mqtt_hostname: String,
    #[serde(default = "default_mqtt_port")]
    mqtt_port: u16,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    #[serde(default = "default_keep_alive")]
    mqtt_keep_alive_seconds: u16,
    #[serde(default = "default_topic_vehicle")]
    topic_vehicle: String,
    #[serde(default = "default_topic_status")]
    topic_status: String,
    #[serde(default = "default_topic_barrier")]
    topic_barrier: String,
    #[serde(default = "default_threshold")]
    detection_threshold_cm: u16,
    #[serde(default = "default_hysteresis")]
    detection_hysteresis_cm: u16,
    #[serde(default = "default_confirm_samples")]
    detection_confirm_samples: u8,
    #[serde(default = "default_sample_interval")]
    sample_interval_ms: u32,
    #[serde(default = "default_open_seconds")]
    barrier_open_seconds: u16,
    #[serde(default = "default_closed_angle")]
    barrier_closed_angle: u8,
    #[serde(default = "default_open_angle")]
    barrier_open_angle: u8,
}

fn default_device_id() -> String {
    defaults::DEFAULT_DEVICE_ID.into()
}
fn default_mqtt_port() -> u16 {
    defaults::DEFAULT_MQTT_PORT
}
fn default_keep_alive() -> u16 {
    defaults::DEFAULT_MQTT_KEEP_ALIVE_SECONDS
}
fn default_topic_vehicle() -> String {
    defaults::DEFAULT_TOPIC_VEHICLE.into()
}
fn default_topic_status() -> String {
    defaults::DEFAULT_TOPIC_STATUS.into()
}
fn default_topic_barrier() -> String {
    defaults::DEFAULT_TOPIC_BARRIER.into()
}
fn default_threshold() -> u16 {
    defaults::DEFAULT_DETECTION_THRESHOLD_CM
}
fn default_hysteresis() -> u16 {
    defaults::DEFAULT_DETECTION_HYSTERESIS_CM
}
fn default_confirm_samples() -> u8 {
    defaults::DEFAULT_DETECTION_CONFIRM_SAMPLES
}
fn default_sample_interval() -> u32 {
    defaults::DEFAULT_SAMPLE_INTERVAL_MS
}
fn default_open_seconds() -> u16 {
    defaults::DEFAULT_BARRIER_OPEN_SECONDS
}
fn default_closed_angle() -> u8 {
    defaults::DEFAULT_BARRIER_CLOSED_ANGLE
}
fn default_open_angle() -> u8 {
    defaults::DEFAULT_BARRIER_OPEN_ANGLE
}

impl RawConfig {
    fn as_config(&self) -> Config<'_> {
        Config {
            device_id: &self.device_id,
            wifi_ssid: &self.wifi_ssid,
            wifi_psk: &self.wifi_psk,
            mqtt_hostname: &self.mqtt_hostname,
            mqtt_port: self.mqtt_port,
            mqtt_username: self.mqtt_username.as_deref(),
            mqtt_password: self.mqtt_password.as_deref(),
            mqtt_keep_alive_seconds: self.mqtt_keep_alive_seconds,
            topic_vehicle: &self.topic_vehicle,
            topic_status: &self.topic_status,
            topic_barrier: &self.topic_barrier,
            detection_threshold_cm: self.detection_threshold_cm,
            detection_hysteresis_cm: self.detection_hysteresis_cm,
            detection_confirm_samples: self.detection_confirm_samples,
            sample_interval_ms: self.sample_interval_ms,
            barrier_open_seconds: self.barrier_open_seconds,
            barrier_closed_angle: self.barrier_closed_angle,
            barrier_open_angle: self.barrier_open_angle,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let config_path =
        env::var("PARKING_NODE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // Tell Cargo to rerun if toml changes
    println!("cargo:rerun-if-changed={}", config_path);
    println!("cargo:rerun-if-env-changed=PARKING_NODE_CONFIG");

    // Read and parse
    let toml_str = fs::read_to_string(&config_path).map_err(|e| {
        format!("cannot read {config_path} ({e}), copy cfg.toml.example to cfg.toml")
    })?;
    let raw: RawConfig = toml::from_str(&toml_str)?;

    let config = raw.as_config();
    config
        .validate()
        .map_err(|e| format!("invalid {config_path}: {e}"))?;

    // Generate Rust code
    let code = format!(
        r#"
        pub const CONFIG: Config<'static> = Config {{
            device_id: {device_id:?},
            wifi_ssid: {ssid:?},
            wifi_psk: {psk:?},
            mqtt_hostname: {mh:?},
            mqtt_port: {mp},
            mqtt_username: {mu:?},
            mqtt_password: {mpw:?},
            mqtt_keep_alive_seconds: {mka},
            topic_vehicle: {tv:?},
            topic_status: {ts:?},
            topic_barrier: {tb:?},
            detection_threshold_cm: {dt},
            detection_hysteresis_cm: {dh},
            detection_confirm_samples: {dc},
            sample_interval_ms: {si},
            barrier_open_seconds: {bo},
            barrier_closed_angle: {bca},
            barrier_open_angle: {boa},
        }};
    "#,
        device_id = config.device_id,
        ssid = config.wifi_ssid,
        psk = config.wifi_psk,
        mh = config.mqtt_hostname,
        mp = config.mqtt_port,
        mu = config.mqtt_username,
        mpw = config.mqtt_password,
        mka = config.mqtt_keep_alive_seconds,
        tv = config.topic_vehicle,
        ts = config.topic_status,
        tb = config.topic_barrier,
        dt = config.detection_threshold_cm,
        dh = config.detection_hysteresis_cm,
        dc = config.detection_confirm_samples,
        si = config.sample_interval_ms,
        bo = config.barrier_open_seconds,
        bca = config.barrier_closed_angle,
        boa = config.barrier_open_angle,
    );

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("config.rs");
    fs::write(dest_path, code)?;
    Ok(())
}
