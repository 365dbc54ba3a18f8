use embassy_time::{Duration, Ticker};
use log::{info, warn};
use parking_node_core::PresenceDetector;

use crate::config::CONFIG;
use crate::events::VEHICLE_EVENTS;
use crate::sensors::{hcsr04::HcSr04, RangeSensor};

pub type Ranger = HcSr04<esp_hal::gpio::Output<'static>, esp_hal::gpio::Input<'static>>;

/// Samples the ranger and queues an event on every confirmed arrival or
/// departure.
#[embassy_executor::task]
pub async fn detection_task(mut ranger: Ranger) {
    let mut detector = PresenceDetector::new(
        CONFIG.detection_threshold_cm,
        CONFIG.detection_hysteresis_cm,
        CONFIG.detection_confirm_samples,
    );
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(CONFIG.sample_interval_ms)));

    info!(
        "Vehicle detection started: threshold {} cm, every {} ms",
        CONFIG.detection_threshold_cm, CONFIG.sample_interval_ms
    );

    loop {
        ticker.next().await;

        let reading = match ranger.distance_cm().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Range measurement failed: {:?}", e);
                continue;
            }
        };

        let Some(event) = detector.update(reading) else {
            continue;
        };

        info!(
            "Vehicle {} at {:.1} cm",
            if event.detected { "arrived" } else { "left" },
            event.distance_cm
        );

        if VEHICLE_EVENTS.try_send(event).is_err() {
            warn!("Vehicle event queue full, dropping event");
        }
    }
}
