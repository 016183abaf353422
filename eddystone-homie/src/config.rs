use eyre::Report;
use rumqttc::{MqttOptions, Transport};
use rustls::{ClientConfig, RootCertStore};
use serde_derive::Deserialize;
use stable_eyre::eyre::WrapErr;
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::time::Duration;

const DEFAULT_MQTT_PREFIX: &str = "homie";
const DEFAULT_DEVICE_ID: &str = "eddystone-bridge";
const DEFAULT_DEVICE_NAME: &str = "Eddystone bridge";
const DEFAULT_HOST: &str = "test.mosquitto.org";
const DEFAULT_PORT: u16 = 1883;
const CONFIG_FILENAME: &str = "eddystone-homie.toml";
const KEEP_ALIVE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Index of the local Bluetooth adapter to scan on, i.e. `hciN`.
    #[serde(default)]
    pub bt_device_id: u32,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub homie: HomieConfig,
    /// Beacons to monitor, keyed by an internal name. They are registered in key order.
    pub beacons: BTreeMap<String, BeaconEntry>,
}

impl Config {
    pub fn from_file() -> Result<Config, Report> {
        Config::read(CONFIG_FILENAME)
    }

    fn read(filename: &str) -> Result<Config, Report> {
        let config_file =
            read_to_string(filename).wrap_err_with(|| format!("Reading {filename}"))?;
        toml::from_str(&config_file).wrap_err_with(|| format!("Parsing {filename}"))
    }
}

/// A beacon as written in the config file, before validation.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BeaconEntry {
    /// Eddystone-UID namespace, 20 hex digits.
    pub namespace: Option<String>,
    /// Eddystone-UID instance, 12 hex digits.
    pub instance: Option<String>,
    /// MAC address, as 6 colon-separated hex octets.
    pub mac: Option<String>,
    /// Display name, defaulting to the key.
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_name: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> MqttConfig {
        MqttConfig {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            use_tls: false,
            username: None,
            password: None,
            client_name: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HomieConfig {
    pub device_id: String,
    pub device_name: String,
    pub prefix: String,
}

impl Default for HomieConfig {
    fn default() -> HomieConfig {
        HomieConfig {
            device_id: DEFAULT_DEVICE_ID.to_owned(),
            device_name: DEFAULT_DEVICE_NAME.to_owned(),
            prefix: DEFAULT_MQTT_PREFIX.to_owned(),
        }
    }
}

/// Construct the `MqttOptions` for connecting to the MQTT broker based on configuration options or
/// defaults.
pub fn get_mqtt_options(config: MqttConfig, device_id: &str) -> Result<MqttOptions, Report> {
    let client_name = config.client_name.unwrap_or_else(|| device_id.to_owned());

    let mut mqtt_options = MqttOptions::new(client_name, config.host, config.port);

    mqtt_options.set_keep_alive(KEEP_ALIVE);
    if let (Some(username), Some(password)) = (config.username, config.password) {
        mqtt_options.set_credentials(username, password);
    }

    if config.use_tls {
        let mut root_store = RootCertStore::empty();
        let native_certs = rustls_native_certs::load_native_certs();
        if let Some(e) = native_certs.errors.first() {
            log::warn!("Error loading some platform certificates: {}", e);
        }
        let (added, ignored) = root_store.add_parsable_certificates(native_certs.certs);
        if added == 0 {
            eyre::bail!("No usable platform certificates ({ignored} ignored)");
        }
        let client_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        mqtt_options.set_transport(Transport::tls_with_config(client_config.into()));
    }
    Ok(mqtt_options)
}
