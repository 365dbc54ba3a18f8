use embassy_time::Duration;
use log::debug;

use crate::payload::VehicleEvent;

/// Speed of sound at ~20°C in cm/µs
const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// HC-SR04 usable range
pub const MIN_RANGE_CM: f32 = 2.0;
pub const MAX_RANGE_CM: f32 = 400.0;

/// Convert an echo pulse width into a distance.
///
/// Returns `None` when the echo is outside the sensor's usable range, which
/// happens when nothing reflects the burst back.
pub fn echo_to_distance_cm(echo: Duration) -> Option<f32> {
    let distance = echo.as_micros() as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0;
    if (MIN_RANGE_CM..=MAX_RANGE_CM).contains(&distance) {
        Some(distance)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Present,
}

/// Debounces raw distance readings into vehicle arrival/departure events.
pub struct PresenceDetector {
    threshold_cm: f32,
    release_cm: f32,
    confirm_samples: u8,
    state: Presence,
    pending: u8,
    last_distance: f32,
}

impl PresenceDetector {
    pub fn new(threshold_cm: u16, hysteresis_cm: u16, confirm_samples: u8) -> Self {
        Self {
            threshold_cm: threshold_cm.into(),
            release_cm: (threshold_cm.saturating_add(hysteresis_cm)).into(),
            confirm_samples: confirm_samples.max(1),
            state: Presence::Absent,
            pending: 0,
            last_distance: 0.0,
        }
    }

    pub fn presence(&self) -> Presence {
        self.state
    }

    /// Feed one reading (`None` when no echo came back).
    ///
    /// Returns an event only when the state changes, after `confirm_samples`
    /// consecutive readings agree on the new state.
    pub fn update(&mut self, reading: Option<f32>) -> Option<VehicleEvent> {
        self.last_distance = reading.unwrap_or(0.0);

        let sample = match reading {
            Some(distance) if distance <= self.threshold_cm => Some(Presence::Present),
            Some(distance) if distance <= self.release_cm => None,
            _ => Some(Presence::Absent),
        };

        match sample {
            Some(sample) if sample != self.state => {
                self.pending += 1;
                if self.pending < self.confirm_samples {
                    return None;
                }
                self.pending = 0;
                self.state = sample;
                debug!(
                    "Presence changed to {:?} at {:.1} cm",
                    self.state, self.last_distance
                );
                Some(VehicleEvent {
                    detected: self.state == Presence::Present,
                    distance_cm: self.last_distance,
                })
            }
            // Agreeing or in-band samples break a pending transition streak
            _ => {
                self.pending = 0;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_echo_to_centimeters() {
        // 1 ms round trip is ~17 cm
        let distance = echo_to_distance_cm(Duration::from_micros(1000)).unwrap();
        assert!((distance - 17.15).abs() < 0.01);
    }

    #[test]
    fn out_of_range_echo_is_none() {
        assert_eq!(echo_to_distance_cm(Duration::from_micros(50)), None);
        assert_eq!(echo_to_distance_cm(Duration::from_micros(30_000)), None);
    }

    #[test]
    fn arrival_needs_consecutive_samples() {
        let mut detector = PresenceDetector::new(30, 5, 3);
        assert_eq!(detector.update(Some(20.0)), None);
        assert_eq!(detector.update(Some(21.0)), None);
        let event = detector.update(Some(22.0)).unwrap();
        assert!(event.detected);
        assert_eq!(event.distance_cm, 22.0);
        assert_eq!(detector.presence(), Presence::Present);

        // Already present, nothing more to report
        assert_eq!(detector.update(Some(22.0)), None);
    }

    #[test]
    fn noisy_sample_restarts_confirmation() {
        let mut detector = PresenceDetector::new(30, 5, 2);
        assert_eq!(detector.update(Some(10.0)), None);
        assert_eq!(detector.update(Some(200.0)), None);
        assert_eq!(detector.update(Some(10.0)), None);
        assert!(detector.update(Some(10.0)).is_some());
    }

    #[test]
    fn hysteresis_band_holds_state() {
        let mut detector = PresenceDetector::new(30, 5, 1);
        assert!(detector.update(Some(25.0)).unwrap().detected);

        // Between threshold and threshold + hysteresis
        assert_eq!(detector.update(Some(33.0)), None);
        assert_eq!(detector.presence(), Presence::Present);

        let event = detector.update(Some(36.0)).unwrap();
        assert!(!event.detected);
        assert_eq!(detector.presence(), Presence::Absent);
    }

    #[test]
    fn missing_echo_counts_as_absent() {
        let mut detector = PresenceDetector::new(30, 5, 1);
        assert!(detector.update(Some(5.0)).is_some());
        let event = detector.update(None).unwrap();
        assert!(!event.detected);
        assert_eq!(event.distance_cm, 0.0);
    }

    #[test]
    fn zero_confirm_samples_behaves_like_one() {
        let mut detector = PresenceDetector::new(30, 5, 0);
        assert!(detector.update(Some(5.0)).is_some());
    }
}
