mod beacon;
mod config;
mod host;
mod monitor;
mod router;
mod scanner;

use crate::beacon::load_beacons;
use crate::config::{Config, get_mqtt_options};
use crate::host::HomieHost;
use crate::monitor::ScanController;
use crate::router::{PacketRouter, route_advertisements};
use crate::scanner::{BluezScanner, DeviceFilter};
use bluez_async::BluetoothSession;
use homie_device::HomieDevice;
use log::{info, warn};
use stable_eyre::eyre;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{Mutex, mpsc};

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    stable_eyre::install()?;
    pretty_env_logger::init();
    color_backtrace::install();

    let config = Config::from_file()?;

    let beacons = load_beacons(&config.beacons);
    if beacons.is_empty() {
        warn!("No devices were added");
        return Ok(());
    }
    let filters = beacons
        .iter()
        .map(|beacon| DeviceFilter::from(&beacon.config.identity))
        .collect();

    let mqtt_options = get_mqtt_options(config.mqtt, &config.homie.device_id)?;
    let device_base = format!("{}/{}", config.homie.prefix, config.homie.device_id);
    let mut homie_builder =
        HomieDevice::builder(&device_base, &config.homie.device_name, mqtt_options);
    homie_builder.set_firmware(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let (homie, homie_handle) = homie_builder.spawn().await?;

    // Connect a Bluetooth session.
    let (dbus_handle, session) = BluetoothSession::new().await?;

    let mut router = PacketRouter::new(beacons, HomieHost::new(homie));
    router.register_all().await?;
    router.host_mut().ready().await?;
    let router = Arc::new(Mutex::new(router));

    let (advertisement_sender, advertisement_receiver) = mpsc::unbounded_channel();
    let scanner = BluezScanner::new(
        session,
        config.bt_device_id,
        filters,
        advertisement_sender,
    );
    let mut monitor = ScanController::new(scanner);

    info!("Starting scanner for Eddystone beacons");
    monitor.start().await?;

    let router_handle = route_advertisements(router.clone(), advertisement_receiver);

    // Run until the first one bombs out, or we are asked to stop.
    tokio::select! {
        // If this ever finishes, we lost connection to D-Bus.
        res = dbus_handle => res?,
        // MQTT event loop finished first.
        res = homie_handle => res?,
        // Publishing a reading failed.
        res = router_handle => res?,
        res = signal::ctrl_c() => res?,
    }

    info!("Stopping scanner for Eddystone beacons");
    monitor.stop().await?;
    log::debug!("Scanner is {:?}", monitor.state());

    for beacon in router.lock().await.beacons() {
        info!("{}: {}", beacon.name(), beacon.state());
    }
    Ok(())
}
