use crate::config::BeaconEntry;
use crate::router::Advertisement;
use bluez_async::MacAddress;
use log::{error, warn};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

const NAMESPACE_LENGTH: usize = 20;
const INSTANCE_LENGTH: usize = 12;
const MAC_LENGTH: usize = 17;

/// Reported as the state of a beacon before any reading has been received.
pub const STATE_UNKNOWN: &str = "unknown";
pub const TEMP_CELSIUS: &str = "ºC";

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InvalidBeacon {
    #[error("Error in config parameter {field}: must be exactly {bytes} bytes")]
    Length { field: &'static str, bytes: usize },
    #[error("Error in config parameter {field}: {value:?} is not valid")]
    Format { field: &'static str, value: String },
    #[error("Neither a mac nor a namespace and instance are configured")]
    MissingIdentity,
}

/// How a beacon is recognised in advertisements.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Identity {
    Mac(String),
    Eddystone { namespace: String, instance: String },
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Mac(mac) => f.write_str(mac),
            Self::Eddystone {
                namespace,
                instance,
            } => write!(f, "{}/{}", namespace, instance),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BeaconConfig {
    pub name: String,
    pub identity: Identity,
}

impl BeaconConfig {
    /// Validates a beacon entry from the config file.
    ///
    /// Fields with the wrong length or format are logged and then treated as missing, so a beacon
    /// with a bad MAC address but a valid namespace and instance is still accepted.
    pub fn from_entry(key: &str, entry: &BeaconEntry) -> Result<Self, InvalidBeacon> {
        let namespace = valid_field(key, "namespace", &entry.namespace, NAMESPACE_LENGTH, is_hex);
        let instance = valid_field(key, "instance", &entry.instance, INSTANCE_LENGTH, is_hex);
        let mac = valid_field(key, "mac", &entry.mac, MAC_LENGTH, is_mac);

        let identity = match (mac, namespace, instance) {
            (Some(mac), namespace, instance) => {
                if namespace.is_some() && instance.is_some() {
                    warn!("{}: mac is configured, ignoring namespace and instance", key);
                }
                Identity::Mac(mac)
            }
            (None, Some(namespace), Some(instance)) => Identity::Eddystone {
                namespace,
                instance,
            },
            (None, _, _) => return Err(InvalidBeacon::MissingIdentity),
        };
        Ok(Self {
            name: entry.name.clone().unwrap_or_else(|| key.to_owned()),
            identity,
        })
    }
}

/// Returns the value of the field if it is set and valid, logging an error if it is set but
/// invalid.
fn valid_field(
    key: &str,
    field: &'static str,
    value: &Option<String>,
    length: usize,
    well_formed: fn(&str) -> bool,
) -> Option<String> {
    let value = value.as_deref().filter(|value| !value.is_empty())?;
    match check_field(field, value, length, well_formed) {
        Ok(()) => {
            if has_uppercase(value) {
                warn!(
                    "{}: {} {:?} contains uppercase hex, but is compared exactly with the lowercase \
                     hex reported by the scanner, so it will never match",
                    key, field, value
                );
            }
            Some(value.to_owned())
        }
        Err(e) => {
            error!("{}: {}. Device will not be added", key, e);
            None
        }
    }
}

fn check_field(
    field: &'static str,
    value: &str,
    length: usize,
    well_formed: fn(&str) -> bool,
) -> Result<(), InvalidBeacon> {
    if value.len() != length {
        Err(InvalidBeacon::Length {
            field,
            bytes: length / 2,
        })
    } else if !well_formed(value) {
        Err(InvalidBeacon::Format {
            field,
            value: value.to_owned(),
        })
    } else {
        Ok(())
    }
}

fn is_hex(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Six two-digit hex octets separated by colons. `MacAddress` alone also accepts a sign in an
/// octet.
fn is_mac(value: &str) -> bool {
    value.split(':').all(|octet| octet.len() == 2 && is_hex(octet))
        && value.parse::<MacAddress>().is_ok()
}

/// Advertisements are reported in lowercase hex, so an uppercase value can never match.
fn has_uppercase(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_uppercase())
}

/// A configured beacon and its last known reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Beacon {
    pub key: String,
    pub config: BeaconConfig,
    pub temperature: Option<f32>,
}

impl Beacon {
    pub fn new(key: &str, config: BeaconConfig) -> Self {
        Self {
            key: key.to_owned(),
            config,
            temperature: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The temperature as a string, or "unknown" if there hasn't been a reading yet.
    pub fn state(&self) -> String {
        match self.temperature {
            Some(temperature) => temperature.to_string(),
            None => STATE_UNKNOWN.to_owned(),
        }
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        TEMP_CELSIUS
    }

    /// Homie IDs may only contain lowercase letters, digits and hyphens.
    pub fn node_id(&self) -> String {
        self.key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect()
    }

    /// Whether the advertisement came from this beacon. Strings are compared exactly.
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        match &self.config.identity {
            Identity::Mac(mac) => *mac == advertisement.source_mac,
            Identity::Eddystone {
                namespace,
                instance,
            } => {
                advertisement.namespace.as_ref() == Some(namespace)
                    && advertisement.instance.as_ref() == Some(instance)
            }
        }
    }
}

/// Builds the list of beacons to monitor, skipping any which are invalid.
pub fn load_beacons(entries: &BTreeMap<String, BeaconEntry>) -> Vec<Beacon> {
    entries
        .iter()
        .filter_map(|(key, entry)| match BeaconConfig::from_entry(key, entry) {
            Ok(config) => Some(Beacon::new(key, config)),
            Err(e) => {
                error!("Skipping {}: {}", key, e);
                None
            }
        })
        .collect()
}
