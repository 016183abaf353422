use crate::beacon::Identity;
use crate::monitor::Scanner;
use crate::router::Advertisement;
use bluez_async::{
    AdapterId, BluetoothError, BluetoothEvent, BluetoothSession, DeviceEvent, DeviceId,
    DiscoveryFilter, Transport,
};
use eddystone::Frame;
use eyre::{Report, eyre};
use futures::{Stream, StreamExt};
use itertools::Itertools;
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Which devices to pass advertisements on for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceFilter {
    Mac(String),
    Eddystone { namespace: String, instance: String },
}

impl DeviceFilter {
    fn matches(&self, source_mac: &str, uid: Option<&Uid>) -> bool {
        match self {
            Self::Mac(mac) => mac == source_mac,
            Self::Eddystone {
                namespace,
                instance,
            } => uid.is_some_and(|uid| uid.namespace == *namespace && uid.instance == *instance),
        }
    }
}

impl From<&Identity> for DeviceFilter {
    fn from(identity: &Identity) -> Self {
        match identity {
            Identity::Mac(mac) => Self::Mac(mac.to_owned()),
            Identity::Eddystone {
                namespace,
                instance,
            } => Self::Eddystone {
                namespace: namespace.to_owned(),
                instance: instance.to_owned(),
            },
        }
    }
}

impl Display for DeviceFilter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Mac(mac) => write!(f, "mac {}", mac),
            Self::Eddystone {
                namespace,
                instance,
            } => write!(f, "uid {}/{}", namespace, instance),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Uid {
    namespace: String,
    instance: String,
}

/// Turns decoded frames into advertisements for the router.
///
/// Only TLM frames are passed on. UID frames are remembered per sender, so that later TLM frames
/// from the same sender can be matched by namespace and instance.
#[derive(Debug, Default)]
pub struct AdvertisementFilter {
    filters: Vec<DeviceFilter>,
    uids: HashMap<String, Uid>,
}

impl AdvertisementFilter {
    pub fn new(filters: Vec<DeviceFilter>) -> Self {
        Self {
            filters,
            uids: HashMap::new(),
        }
    }

    pub fn accept(&mut self, source_mac: &str, frame: &Frame) -> Option<Advertisement> {
        match frame {
            Frame::Uid(uid) => {
                self.uids.insert(
                    source_mac.to_owned(),
                    Uid {
                        namespace: uid.namespace_hex(),
                        instance: uid.instance_hex(),
                    },
                );
                None
            }
            Frame::Tlm(tlm) => {
                let uid = self.uids.get(source_mac);
                if !self
                    .filters
                    .iter()
                    .any(|filter| filter.matches(source_mac, uid))
                {
                    return None;
                }
                Some(Advertisement {
                    source_mac: source_mac.to_owned(),
                    raw_temperature: tlm.raw_temperature,
                    namespace: uid.map(|uid| uid.namespace.clone()),
                    instance: uid.map(|uid| uid.instance.clone()),
                })
            }
        }
    }
}

#[derive(Debug)]
struct ActiveScan {
    adapter: AdapterId,
    pump: JoinHandle<()>,
}

/// Scans for Eddystone advertisements on one Bluetooth adapter via BlueZ, and sends the ones which
/// pass the filters to the router.
#[derive(Debug)]
pub struct BluezScanner {
    session: BluetoothSession,
    bt_device_id: u32,
    filters: Vec<DeviceFilter>,
    advertisements: UnboundedSender<Advertisement>,
    scan: Option<ActiveScan>,
}

impl BluezScanner {
    pub fn new(
        session: BluetoothSession,
        bt_device_id: u32,
        filters: Vec<DeviceFilter>,
        advertisements: UnboundedSender<Advertisement>,
    ) -> Self {
        Self {
            session,
            bt_device_id,
            filters,
            advertisements,
            scan: None,
        }
    }

    async fn find_adapter(&self) -> Result<AdapterId, Report> {
        let name = format!("hci{}", self.bt_device_id);
        self.session
            .get_adapters()
            .await?
            .into_iter()
            .map(|adapter| adapter.id)
            .find(|id| id.to_string() == name)
            .ok_or_else(|| eyre!("Bluetooth adapter {} not found", name))
    }
}

impl Scanner for BluezScanner {
    type Error = Report;

    async fn start(&mut self) -> Result<(), Report> {
        let adapter = self.find_adapter().await?;
        info!(
            "Scanning on {} for {}",
            adapter,
            self.filters.iter().join(", ")
        );
        let events = self.session.event_stream().await?;
        self.session
            .start_discovery_on_adapter_with_filter(
                &adapter,
                &DiscoveryFilter {
                    service_uuids: vec![eddystone::UUID],
                    transport: Some(Transport::Le),
                    duplicate_data: Some(true),
                    ..DiscoveryFilter::default()
                },
            )
            .await?;
        let pump = tokio::spawn(pump_advertisements(
            self.session.clone(),
            adapter.clone(),
            events,
            AdvertisementFilter::new(self.filters.clone()),
            self.advertisements.clone(),
        ));
        self.scan = Some(ActiveScan { adapter, pump });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Report> {
        // Keep hold of the scan until discovery has stopped, so a failed stop can be retried.
        if let Some(scan) = &self.scan {
            self.session.stop_discovery_on_adapter(&scan.adapter).await?;
        }
        if let Some(scan) = self.scan.take() {
            scan.pump.abort();
        }
        Ok(())
    }
}

async fn pump_advertisements(
    session: BluetoothSession,
    adapter: AdapterId,
    mut events: impl Stream<Item = BluetoothEvent> + Unpin,
    mut filter: AdvertisementFilter,
    advertisements: UnboundedSender<Advertisement>,
) {
    let mut macs = HashMap::new();
    while let Some(event) = events.next().await {
        let BluetoothEvent::Device {
            id,
            event: DeviceEvent::ServiceData { service_data },
        } = event
        else {
            continue;
        };
        if id.adapter() != adapter {
            continue;
        }
        let Some(frame) = Frame::from_service_data(&service_data) else {
            continue;
        };
        let source_mac = match source_mac(&session, &mut macs, &id).await {
            Ok(mac) => mac,
            Err(e) => {
                warn!("Couldn't get MAC address of {}: {}", id, e);
                continue;
            }
        };
        trace!("{}: {}", source_mac, frame);
        if let Some(advertisement) = filter.accept(&source_mac, &frame) {
            if advertisements.send(advertisement).is_err() {
                debug!("Router has gone away, no longer scanning");
                break;
            }
        }
    }
}

/// Looks up the MAC address of the device, as lowercase hex.
async fn source_mac(
    session: &BluetoothSession,
    macs: &mut HashMap<DeviceId, String>,
    id: &DeviceId,
) -> Result<String, BluetoothError> {
    if let Some(mac) = macs.get(id) {
        return Ok(mac.to_owned());
    }
    let info = session.get_device_info(id).await?;
    let mac = format!("{:x}", info.mac_address);
    macs.insert(id.to_owned(), mac.clone());
    Ok(mac)
}
