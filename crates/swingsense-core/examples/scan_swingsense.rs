//! Scan once for a SwingSense peripheral and print what it advertises

use std::env;
use std::time::Duration;

use swingsense_core::{AdvertisementFilter, BleTransport, find_target};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let secs = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    println!("Scanning for SwingSense ({}s)...", secs);
    let transport = BleTransport::new().await?;
    let found = find_target(
        &transport,
        &AdvertisementFilter::default(),
        Duration::from_secs(secs),
    )
    .await;

    match found {
        Some(candidate) => {
            println!("Found: {}", candidate.display_name());
            println!("  id:       {}", candidate.id);
            println!("  rssi:     {:?}", candidate.rssi);
            for service in &candidate.services {
                println!("  service:  {}", service);
            }
            for (company, payload) in &candidate.manufacturer_data {
                println!("  mfr data: {:04X} {:02X?}", company, payload);
            }
        }
        None => println!("No SwingSense peripheral found"),
    }
    Ok(())
}
