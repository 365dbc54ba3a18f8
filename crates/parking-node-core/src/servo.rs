use crate::config::MAX_SERVO_ANGLE;

/// Pulse timings of a hobby servo (SG90 and alike)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCalibration {
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub period_us: u32,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            min_pulse_us: 500,
            max_pulse_us: 2500,
            period_us: 20_000,
        }
    }
}

impl ServoCalibration {
    pub fn frequency_hz(&self) -> u32 {
        1_000_000 / self.period_us
    }

    pub fn pulse_for_angle(&self, angle: u8) -> u32 {
        let angle = u32::from(angle.min(MAX_SERVO_ANGLE));
        self.min_pulse_us
            + (self.max_pulse_us - self.min_pulse_us) * angle / u32::from(MAX_SERVO_ANGLE)
    }

    /// Duty register value for a PWM timer with `resolution_bits` of resolution.
    pub fn duty_for_pulse(&self, pulse_us: u32, resolution_bits: u8) -> u32 {
        let max_duty = (1u64 << resolution_bits) - 1;
        let duty = u64::from(pulse_us.min(self.period_us)) * (max_duty + 1) / u64::from(self.period_us);
        duty.min(max_duty) as u32
    }

    pub fn duty_for_angle(&self, angle: u8, resolution_bits: u8) -> u32 {
        self.duty_for_pulse(self.pulse_for_angle(angle), resolution_bits)
    }
}
