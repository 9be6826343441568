//! Wi-Fi station bring-up and the embassy-net stack
//!
//! The device is a station: it joins an existing network named in `.env`
//! and takes its address over DHCP. It does not run its own access point,
//! so the status page is reached at the DHCP address logged on connect,
//! not at a fixed soft-AP address. A dropped link is retried forever; the
//! monitor loop never waits on the network.

use alloc::string::String;

use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, DhcpConfig, Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::Controller as RadioController;
use esp_radio::wifi::{self, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use log::{error, info, warn};
use static_cell::StaticCell;

use ember_core::error::PeripheralInitFault;

use crate::wifi_secrets::{WIFI_PASSWORD, WIFI_SSID};

/// Sockets available to the stack: HTTP workers plus DHCP
const SOCKET_COUNT: usize = 4;

const RETRY_DELAY: Duration = Duration::from_secs(5);

static RADIO_CONTROLLER: StaticCell<RadioController<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();

/// Bring up the radio and spawn the connection and stack runner tasks.
///
/// Returns the stack so the HTTP workers can listen on it once it is up.
pub fn start(
    spawner: &Spawner,
    wifi: WIFI<'static>,
) -> Result<Stack<'static>, PeripheralInitFault> {
    let radio = esp_radio::init().map_err(|e| {
        error!("Radio init failed: {:?}", e);
        PeripheralInitFault::Network {
            details: "radio controller init failed",
        }
    })?;
    let radio = RADIO_CONTROLLER.init(radio);

    let (controller, interfaces) = wifi::new(radio, wifi, Default::default()).map_err(|e| {
        error!("Wi-Fi driver init failed: {:?}", e);
        PeripheralInitFault::Network {
            details: "Wi-Fi driver init failed",
        }
    })?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(DhcpConfig::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    let spawn_failed = |_| PeripheralInitFault::Network {
        details: "network task could not be spawned",
    };
    spawner.spawn(connection_task(controller, stack).map_err(spawn_failed)?);
    spawner.spawn(net_task(runner).map_err(spawn_failed)?);

    Ok(stack)
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[embassy_executor::task]
async fn connection_task(mut controller: WifiController<'static>, stack: Stack<'static>) {
    info!("Wi-Fi task starting (ssid=\"{}\")", WIFI_SSID);

    let client_config = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(String::from(WIFI_SSID))
            .with_password(String::from(WIFI_PASSWORD)),
    );

    loop {
        if !matches!(controller.is_started(), Ok(true)) {
            if let Err(e) = controller.set_config(&client_config) {
                warn!("Wi-Fi set_config failed: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                warn!("Wi-Fi start failed: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
        }

        match controller.connect_async().await {
            Ok(()) => {
                stack.wait_config_up().await;
                if let Some(config) = stack.config_v4() {
                    info!("Wi-Fi up, status page at http://{}/", config.address.address());
                }

                controller.wait_for_event(WifiEvent::StaDisconnected).await;
                warn!("Wi-Fi disconnected, reconnecting");
            }
            Err(e) => warn!("Wi-Fi connect failed: {:?}", e),
        }

        Timer::after(RETRY_DELAY).await;
    }
}
