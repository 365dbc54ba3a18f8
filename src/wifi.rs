use embassy_executor::Spawner;
use embassy_net::{DhcpConfig, Runner, Stack, StackResources, StaticConfigV4};
use embassy_time::{with_timeout, Duration, Timer};

use esp_hal::rng::Rng;
use esp_radio::{
    wifi::{
        ClientConfig, Config, ModeConfig, WifiController, WifiDevice, WifiError, WifiEvent,
        WifiStaState,
    },
    Controller,
};

use heapless::String;
use log::{error, info, warn};
use static_cell::StaticCell;

use crate::constants::{WIFI_CONNECT_TIMEOUT_SECS, WIFI_RECONNECT_DELAY_MS};

/// DHCP socket plus DNS and the MQTT connection
const MAX_SOCKETS: usize = 4;

static RESOURCES: StaticCell<StackResources<MAX_SOCKETS>> = StaticCell::new();

#[derive(Debug)]
pub enum Error {
    RadioInitFailed,
    HostnameTooLong,
    TaskSpawnFailed,
}

/// Station credentials, copied out of the compiled configuration.
pub struct Credentials {
    pub ssid: &'static str,
    pub psk: &'static str,
}

/// Bring up the station interface and its network stack.
///
/// Spawns the association and stack runner tasks; the returned stack becomes
/// usable once [`wait_for_ip`] resolves.
pub fn start_station(
    spawner: Spawner,
    radio: &'static Controller<'static>,
    device: esp_hal::peripherals::WIFI<'static>,
    credentials: Credentials,
    hostname: &str,
) -> Result<Stack<'static>, Error> {
    let (controller, interfaces) =
        esp_radio::wifi::new(radio, device, Config::default()).map_err(|_| Error::RadioInitFailed)?;

    let mut dhcp_config = DhcpConfig::default();
    let mut dhcp_hostname = String::<32>::new();
    dhcp_hostname
        .push_str(hostname)
        .map_err(|_| Error::HostnameTooLong)?;
    dhcp_config.hostname = Some(dhcp_hostname);

    let resources = RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(dhcp_config),
        resources,
        random_seed(),
    );

    spawner
        .spawn(wifi_connection_task(controller, credentials))
        .map_err(|_| Error::TaskSpawnFailed)?;
    spawner
        .spawn(network_runner_task(runner))
        .map_err(|_| Error::TaskSpawnFailed)?;

    Ok(stack)
}

/// Wait for the link to come up and DHCP to hand out an address.
pub async fn wait_for_ip(stack: Stack<'static>) -> StaticConfigV4 {
    info!("Waiting for network link...");
    stack.wait_link_up().await;

    info!("Waiting for DHCP lease...");
    loop {
        if let Some(config) = stack.config_v4() {
            info!("Got IP: {}", config.address);
            return config;
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}

fn random_seed() -> u64 {
    let rng = Rng::new();
    u64::from(rng.random()) << 32 | u64::from(rng.random())
}

async fn ensure_started(
    controller: &mut WifiController<'static>,
    credentials: &Credentials,
) -> Result<(), WifiError> {
    if matches!(controller.is_started(), Ok(true)) {
        return Ok(());
    }

    let client_config = ClientConfig::default()
        .with_ssid(credentials.ssid.into())
        .with_password(credentials.psk.into());
    controller.set_config(&ModeConfig::Client(client_config))?;

    info!("Starting wifi station");
    controller.start_async().await
}

/// Keeps the station associated, reconnecting after every drop.
#[embassy_executor::task]
async fn wifi_connection_task(mut controller: WifiController<'static>, credentials: Credentials) {
    loop {
        if esp_radio::wifi::sta_state() == WifiStaState::Connected {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("Wifi link to {:?} lost", credentials.ssid);
            Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
        }

        if let Err(e) = ensure_started(&mut controller, &credentials).await {
            error!("Failed to start wifi station: {:?}", e);
            Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
            continue;
        }

        info!("Associating with {:?}...", credentials.ssid);
        let attempt = with_timeout(
            Duration::from_secs(WIFI_CONNECT_TIMEOUT_SECS),
            controller.connect_async(),
        )
        .await;

        match attempt {
            Ok(Ok(())) => info!("Wifi associated"),
            Ok(Err(e)) => {
                error!("Wifi association failed: {:?}", e);
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
            }
            Err(_) => {
                error!("Wifi association timed out");
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn network_runner_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
