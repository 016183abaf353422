use crate::beacon::Beacon;
use crate::host::EntityHost;
use eddystone::decode_temperature;
use eyre::Report;
use log::{debug, trace};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

/// A TLM advertisement which passed the scanner's filters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Advertisement {
    /// MAC address of the sender, as lowercase colon-separated hex.
    pub source_mac: String,
    /// Raw temperature field of the TLM frame.
    pub raw_temperature: u16,
    /// Namespace from the most recent UID frame of the same sender, if any.
    pub namespace: Option<String>,
    /// Instance from the most recent UID frame of the same sender, if any.
    pub instance: Option<String>,
}

/// Assigns temperatures from advertisements to beacons, and tells the host about changes.
#[derive(Debug)]
pub struct PacketRouter<H> {
    beacons: Vec<Beacon>,
    host: H,
}

impl<H: EntityHost> PacketRouter<H> {
    pub fn new(beacons: Vec<Beacon>, host: H) -> Self {
        Self { beacons, host }
    }

    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    #[cfg(test)]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Registers every beacon as an entity with the host.
    pub async fn register_all(&mut self) -> Result<(), Report> {
        for beacon in &self.beacons {
            self.host.register(beacon).await?;
        }
        Ok(())
    }

    /// Updates the first beacon matching the advertisement, and tells the host if its temperature
    /// changed.
    pub async fn handle_advertisement(&mut self, advertisement: &Advertisement) -> Result<(), Report> {
        if let Some(beacon) = update_first_match(&mut self.beacons, advertisement) {
            self.host.state_changed(beacon).await?;
        }
        Ok(())
    }
}

fn update_first_match<'a>(
    beacons: &'a mut [Beacon],
    advertisement: &Advertisement,
) -> Option<&'a Beacon> {
    let temperature = decode_temperature(advertisement.raw_temperature);
    debug!(
        "Received temperature for <{:?},{:?},{}>: {}",
        advertisement.namespace, advertisement.instance, advertisement.source_mac, temperature
    );

    let beacon = beacons
        .iter_mut()
        .find(|beacon| beacon.matches(advertisement))?;
    if beacon.temperature == Some(temperature) {
        trace!("{} unchanged at {}", beacon.name(), temperature);
        return None;
    }
    beacon.temperature = Some(temperature);
    Some(&*beacon)
}

/// Handles advertisements from the scanner until the channel is closed.
pub async fn route_advertisements<H: EntityHost>(
    state: Arc<Mutex<PacketRouter<H>>>,
    mut advertisements: UnboundedReceiver<Advertisement>,
) -> Result<(), Report> {
    while let Some(advertisement) = advertisements.recv().await {
        state
            .lock()
            .await
            .handle_advertisement(&advertisement)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::{BeaconConfig, Identity};
    use tokio::sync::mpsc;

    const MAC: &str = "01:23:45:67:89:ab";
    const NAMESPACE: &str = "edd1ebeac04e5defa017";
    const INSTANCE: &str = "0bdb87539610";

    /// Records the state of every beacon it is told about.
    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub registered: Vec<String>,
        pub notifications: Vec<(String, Option<f32>)>,
    }

    impl EntityHost for RecordingHost {
        async fn register(&mut self, beacon: &Beacon) -> Result<(), Report> {
            self.registered.push(beacon.name().to_owned());
            Ok(())
        }

        async fn state_changed(&mut self, beacon: &Beacon) -> Result<(), Report> {
            self.notifications
                .push((beacon.name().to_owned(), beacon.temperature));
            Ok(())
        }
    }

    fn mac_beacon(key: &str, name: &str, mac: &str) -> Beacon {
        Beacon::new(
            key,
            BeaconConfig {
                name: name.to_owned(),
                identity: Identity::Mac(mac.to_owned()),
            },
        )
    }

    fn uid_beacon(key: &str, name: &str) -> Beacon {
        Beacon::new(
            key,
            BeaconConfig {
                name: name.to_owned(),
                identity: Identity::Eddystone {
                    namespace: NAMESPACE.to_owned(),
                    instance: INSTANCE.to_owned(),
                },
            },
        )
    }

    fn advertisement(raw_temperature: u16) -> Advertisement {
        Advertisement {
            source_mac: MAC.to_owned(),
            raw_temperature,
            namespace: None,
            instance: None,
        }
    }

    #[tokio::test]
    async fn home_freezer() {
        let mut router = PacketRouter::new(
            vec![mac_beacon("home_freezer", "Home Freezer", MAC)],
            RecordingHost::default(),
        );
        router.register_all().await.unwrap();
        router
            .handle_advertisement(&advertisement(0x1980))
            .await
            .unwrap();

        assert_eq!(router.beacons()[0].temperature, Some(-127.902_343_75));
        assert_eq!(router.host().registered, vec!["Home Freezer"]);
        assert_eq!(
            router.host().notifications,
            vec![("Home Freezer".to_owned(), Some(-127.902_343_75))]
        );
    }

    #[tokio::test]
    async fn unchanged_temperature_notifies_once() {
        let mut router = PacketRouter::new(
            vec![mac_beacon("home_freezer", "Home Freezer", MAC)],
            RecordingHost::default(),
        );
        router
            .handle_advertisement(&advertisement(0x0019))
            .await
            .unwrap();
        router
            .handle_advertisement(&advertisement(0x0019))
            .await
            .unwrap();
        assert_eq!(router.host().notifications.len(), 1);

        router
            .handle_advertisement(&advertisement(0x8019))
            .await
            .unwrap();
        assert_eq!(
            router.host().notifications,
            vec![
                ("Home Freezer".to_owned(), Some(25.0)),
                ("Home Freezer".to_owned(), Some(25.5)),
            ]
        );
    }

    #[tokio::test]
    async fn first_matching_beacon_wins() {
        let mut router = PacketRouter::new(
            vec![mac_beacon("a", "Beacon A", MAC), uid_beacon("b", "Beacon B")],
            RecordingHost::default(),
        );
        let both = Advertisement {
            namespace: Some(NAMESPACE.to_owned()),
            instance: Some(INSTANCE.to_owned()),
            ..advertisement(0x0019)
        };
        router.handle_advertisement(&both).await.unwrap();
        assert_eq!(
            router.host().notifications,
            vec![("Beacon A".to_owned(), Some(25.0))]
        );
        assert_eq!(router.beacons()[0].temperature, Some(25.0));
        assert_eq!(router.beacons()[1].temperature, None);
    }

    #[tokio::test]
    async fn matching_is_per_beacon() {
        let mut router = PacketRouter::new(
            vec![
                mac_beacon("a", "Beacon A", "01:23:45:67:89:ac"),
                uid_beacon("b", "Beacon B"),
            ],
            RecordingHost::default(),
        );
        let uid_only = Advertisement {
            namespace: Some(NAMESPACE.to_owned()),
            instance: Some(INSTANCE.to_owned()),
            ..advertisement(0x0019)
        };
        router.handle_advertisement(&uid_only).await.unwrap();
        assert_eq!(
            router.host().notifications,
            vec![("Beacon B".to_owned(), Some(25.0))]
        );
        assert_eq!(router.beacons()[0].temperature, None);
        assert_eq!(router.beacons()[1].temperature, Some(25.0));
    }

    #[tokio::test]
    async fn unknown_sender_ignored() {
        let mut router = PacketRouter::new(
            vec![mac_beacon("a", "Beacon A", "01:23:45:67:89:ac")],
            RecordingHost::default(),
        );
        router
            .handle_advertisement(&advertisement(0x0019))
            .await
            .unwrap();
        assert!(router.host().notifications.is_empty());
        assert_eq!(router.beacons()[0].temperature, None);
    }

    #[tokio::test]
    async fn routes_until_channel_closed() {
        let state = Arc::new(Mutex::new(PacketRouter::new(
            vec![mac_beacon("home_freezer", "Home Freezer", MAC)],
            RecordingHost::default(),
        )));
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(advertisement(0x0019)).unwrap();
        sender.send(advertisement(0x0019)).unwrap();
        sender.send(advertisement(0x80ff)).unwrap();
        drop(sender);

        route_advertisements(state.clone(), receiver).await.unwrap();

        let router = state.lock().await;
        assert_eq!(router.beacons()[0].temperature, Some(-0.5));
        assert_eq!(router.host().notifications.len(), 2);
    }
}
