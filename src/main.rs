#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    peripherals::Peripherals,
    timer::timg::TimerGroup,
};
use esp_println::logger::init_logger;
use esp_radio::Controller;
use log::{error, info};
use static_cell::StaticCell;

extern crate alloc;

mod barrier;
pub mod config;
pub mod constants;
mod detection;
mod events;
pub mod sensors;
mod session;
pub mod transport;
mod wifi;

use config::CONFIG;
use constants::*;
use sensors::hcsr04::HcSr04;
use session::Session;
use wifi::Credentials;

esp_bootloader_esp_idf::esp_app_desc!();

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();

#[derive(Debug)]
enum Error {
    RadioInitFailed,
    #[allow(dead_code)]
    Wifi(wifi::Error),
    #[allow(dead_code)]
    Sensor(sensors::SensorError),
    #[allow(dead_code)]
    Servo(barrier::Error),
    TaskSpawnFailed,
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    info!("Parking node {} v{}", CONFIG.device_id, VERSION);

    if let Err(e) = start(spawner, peripherals).await {
        error!("Startup failed: {:?}", e);
    }

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

async fn start(spawner: Spawner, peripherals: Peripherals) -> Result<(), Error> {
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Local actuators and sensors run without the network
    if cfg!(feature = "barrier") {
        let servo = barrier::Servo::new(peripherals.LEDC, peripherals.GPIO13).map_err(Error::Servo)?;
        spawner
            .spawn(barrier::barrier_task(servo))
            .map_err(|_| Error::TaskSpawnFailed)?;
    }

    if cfg!(feature = "detector") {
        let trigger = Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default());
        let echo = Input::new(
            peripherals.GPIO18,
            InputConfig::default().with_pull(Pull::Down),
        );
        let ranger = HcSr04::new(trigger, echo).map_err(Error::Sensor)?;
        spawner
            .spawn(detection::detection_task(ranger))
            .map_err(|_| Error::TaskSpawnFailed)?;
    }

    let radio = RADIO.init(esp_radio::init().map_err(|_| Error::RadioInitFailed)?);
    let stack = wifi::start_station(
        spawner,
        radio,
        peripherals.WIFI,
        Credentials {
            ssid: CONFIG.wifi_ssid,
            psk: CONFIG.wifi_psk,
        },
        CONFIG.device_id,
    )
    .map_err(Error::Wifi)?;

    wifi::wait_for_ip(stack).await;

    spawner
        .spawn(session::session_task(Session::new(stack)))
        .map_err(|_| Error::TaskSpawnFailed)?;

    Ok(())
}
