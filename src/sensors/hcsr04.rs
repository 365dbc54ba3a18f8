use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;
use log::{info, trace};
use parking_node_core::detector::echo_to_distance_cm;

use super::{RangeSensor, SensorError};
use crate::constants::{ECHO_TIMEOUT_US, TRIGGER_PULSE_US};

/// HC-SR04 ultrasonic ranger wired on a trigger output and an echo input.
pub struct HcSr04<T, E> {
    trigger: T,
    echo: E,
}

impl<T: OutputPin, E: Wait> HcSr04<T, E> {
    pub fn new(mut trigger: T, echo: E) -> Result<Self, SensorError> {
        info!("Initialising HC-SR04...");
        trigger.set_low().map_err(|_| SensorError::PinFailure)?;
        Ok(Self { trigger, echo })
    }

    async fn pulse(&mut self) -> Result<(), SensorError> {
        self.trigger.set_low().map_err(|_| SensorError::PinFailure)?;
        Timer::after_micros(2).await;
        self.trigger
            .set_high()
            .map_err(|_| SensorError::PinFailure)?;
        Timer::after_micros(u64::from(TRIGGER_PULSE_US)).await;
        self.trigger.set_low().map_err(|_| SensorError::PinFailure)
    }

    /// Time the echo pulse, `None` if it never starts or never ends.
    async fn echo_width(&mut self) -> Result<Option<Duration>, SensorError> {
        let timeout = Duration::from_micros(ECHO_TIMEOUT_US);

        match with_timeout(timeout, self.echo.wait_for_high()).await {
            Ok(res) => res.map_err(|_| SensorError::PinFailure)?,
            Err(_) => return Ok(None),
        }
        let rising = Instant::now();

        match with_timeout(timeout, self.echo.wait_for_low()).await {
            Ok(res) => res.map_err(|_| SensorError::PinFailure)?,
            Err(_) => return Ok(None),
        }

        Ok(Some(rising.elapsed()))
    }
}

impl<T: OutputPin, E: Wait> RangeSensor for HcSr04<T, E> {
    async fn distance_cm(&mut self) -> Result<Option<f32>, SensorError> {
        self.pulse().await?;

        let Some(width) = self.echo_width().await? else {
            trace!("HC-SR04: no echo");
            return Ok(None);
        };

        let distance = echo_to_distance_cm(width);
        trace!("HC-SR04: echo {} us -> {:?} cm", width.as_micros(), distance);
        Ok(distance)
    }
}
