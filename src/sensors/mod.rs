#![allow(async_fn_in_trait)]

pub mod hcsr04;

#[derive(Debug)]
pub enum SensorError {
    /// A GPIO could not be driven or sampled
    PinFailure,
}

pub trait RangeSensor {
    /// Measure the distance to the nearest object, `None` when nothing echoed
    /// back within range.
    async fn distance_cm(&mut self) -> Result<Option<f32>, SensorError>;
}
