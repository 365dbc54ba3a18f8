use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use esp_hal::{
    gpio::interconnect::PeripheralOutput,
    ledc::{
        channel::{self, ChannelHW, ChannelIFace},
        timer::{self, TimerIFace},
        LSGlobalClkSource, Ledc, LowSpeed,
    },
    peripherals::LEDC,
    time::Rate,
};
use log::{debug, info};
use parking_node_core::{Barrier, BarrierPosition, ServoCalibration};
use static_cell::StaticCell;

use crate::config::CONFIG;
use crate::constants::SERVO_DUTY_RESOLUTION_BITS;
use crate::events::{BARRIER_COMMANDS, BARRIER_POSITION};

static LEDC: StaticCell<Ledc<'static>> = StaticCell::new();
static SERVO_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();

#[derive(Debug)]
pub enum Error {
    #[allow(dead_code)]
    TimerConfigFailed(timer::Error),
    #[allow(dead_code)]
    ChannelConfigFailed(channel::Error),
}

/// Hobby servo driven by a low speed LEDC channel.
pub struct Servo {
    channel: channel::Channel<'static, LowSpeed>,
    calibration: ServoCalibration,
}

impl Servo {
    pub fn new(ledc: LEDC<'static>, pin: impl PeripheralOutput<'static>) -> Result<Self, Error> {
        let calibration = ServoCalibration::default();

        let ledc = LEDC.init(Ledc::new(ledc));
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

        let servo_timer = SERVO_TIMER.init(ledc.timer::<LowSpeed>(timer::Number::Timer0));
        servo_timer
            .configure(timer::config::Config {
                duty: timer::config::Duty::Duty14Bit,
                clock_source: timer::LSClockSource::APBClk,
                frequency: Rate::from_hz(calibration.frequency_hz()),
            })
            .map_err(Error::TimerConfigFailed)?;

        let mut channel = ledc.channel(channel::Number::Channel0, pin);
        channel
            .configure(channel::config::Config {
                timer: servo_timer,
                duty_pct: 0,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .map_err(Error::ChannelConfigFailed)?;

        info!(
            "Servo ready at {} Hz, {}-bit duty",
            calibration.frequency_hz(),
            SERVO_DUTY_RESOLUTION_BITS
        );

        Ok(Self {
            channel,
            calibration,
        })
    }

    pub fn move_to(&mut self, angle: u8) {
        let duty = self
            .calibration
            .duty_for_angle(angle, SERVO_DUTY_RESOLUTION_BITS);
        debug!(
            "Servo to {} deg ({} us, duty {})",
            angle,
            self.calibration.pulse_for_angle(angle),
            duty
        );
        self.channel.set_duty_hw(duty);
    }
}

fn angle_for(position: BarrierPosition) -> u8 {
    match position {
        BarrierPosition::Open => CONFIG.barrier_open_angle,
        BarrierPosition::Closed => CONFIG.barrier_closed_angle,
    }
}

/// Moves the barrier on server commands and closes it again once the hold
/// time has elapsed.
#[embassy_executor::task]
pub async fn barrier_task(mut servo: Servo) {
    let mut barrier = Barrier::new(Duration::from_secs(u64::from(CONFIG.barrier_open_seconds)));
    servo.move_to(angle_for(barrier.position()));
    BARRIER_POSITION.signal(barrier.position());
    info!("Barrier closed, waiting for commands");

    loop {
        let next = match barrier.deadline() {
            Some(deadline) => match select(BARRIER_COMMANDS.receive(), Timer::at(deadline)).await {
                Either::First(command) => barrier.apply(&command, Instant::now()),
                Either::Second(()) => barrier.poll(Instant::now()),
            },
            None => {
                let command = BARRIER_COMMANDS.receive().await;
                barrier.apply(&command, Instant::now())
            }
        };

        if let Some(position) = next {
            servo.move_to(angle_for(position));
            BARRIER_POSITION.signal(position);
        }
    }
}
