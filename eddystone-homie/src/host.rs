use crate::beacon::Beacon;
use eyre::Report;
use homie_device::{HomieDevice, Node, Property};

/// Something which exposes beacons as entities, and propagates their changes.
pub trait EntityHost {
    /// Registers the beacon as an entity. Entities are pushed to, never polled.
    async fn register(&mut self, beacon: &Beacon) -> Result<(), Report>;

    /// Tells the host that the beacon's state has changed.
    async fn state_changed(&mut self, beacon: &Beacon) -> Result<(), Report>;
}

/// Publishes beacons as nodes of a Homie device.
#[derive(Debug)]
pub struct HomieHost {
    homie: HomieDevice,
}

impl HomieHost {
    const PROPERTY_ID_TEMPERATURE: &'static str = "temperature";

    pub fn new(homie: HomieDevice) -> Self {
        Self { homie }
    }

    /// Marks the Homie device as ready, once all beacons are registered.
    pub async fn ready(&mut self) -> Result<(), Report> {
        self.homie.ready().await?;
        Ok(())
    }

    fn as_node(beacon: &Beacon) -> Node {
        Node::new(
            &beacon.node_id(),
            beacon.name(),
            "Eddystone beacon",
            vec![Property::float(
                Self::PROPERTY_ID_TEMPERATURE,
                "Temperature",
                false,
                true,
                Some(beacon.unit_of_measurement()),
                None,
            )],
        )
    }
}

impl EntityHost for HomieHost {
    async fn register(&mut self, beacon: &Beacon) -> Result<(), Report> {
        log::info!(
            "Adding {} ({}) as node {}",
            beacon.name(),
            beacon.config.identity,
            beacon.node_id()
        );
        self.homie.add_node(Self::as_node(beacon)).await?;
        Ok(())
    }

    async fn state_changed(&mut self, beacon: &Beacon) -> Result<(), Report> {
        let Some(temperature) = beacon.temperature else {
            return Ok(());
        };
        println!("{}: {:.2}{}", beacon.name(), temperature, beacon.unit_of_measurement());
        self.homie
            .publish_value(
                &beacon.node_id(),
                Self::PROPERTY_ID_TEMPERATURE,
                format!("{:.2}", temperature),
            )
            .await?;
        Ok(())
    }
}
