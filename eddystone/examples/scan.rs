use bluez_async::{BluetoothEvent, BluetoothSession, DeviceEvent, DiscoveryFilter, Transport};
use eddystone::{Frame, UUID};
use futures::stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    pretty_env_logger::init();

    let (_, session) = BluetoothSession::new().await?;
    let mut events = session.event_stream().await?;

    // Start scanning for Eddystone beacons.
    session
        .start_discovery_with_filter(&DiscoveryFilter {
            service_uuids: vec![UUID],
            transport: Some(Transport::Le),
            duplicate_data: Some(true),
            ..DiscoveryFilter::default()
        })
        .await?;

    // Wait for events.
    while let Some(event) = events.next().await {
        if let BluetoothEvent::Device {
            id,
            event: DeviceEvent::ServiceData { service_data },
        } = event
        {
            if let Some(data) = service_data.get(&UUID) {
                println!("{}: {:02x?}", id, data);
                match Frame::decode(data) {
                    Ok(frame) => println!("  {}", frame),
                    Err(e) => println!("  (Failed to decode: {})", e),
                }
            }
        }
    }

    Ok(())
}
