//! Advertisement scanning over btleplug.
//!
//! [`scan_for_target`] watches adapter events and returns the first
//! peripheral advertising during the scan whose properties satisfy an
//! [`AdvertisementFilter`].

use std::future::Future;
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt, future};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::discovery::{AdvertisementFilter, DeviceCandidate};
use crate::error::{DeviceNotFoundReason, Error, Result};

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Format a peripheral ID as a string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create an identifier string from an address and peripheral ID.
///
/// On macOS where addresses are 00:00:00:00:00:00, uses the peripheral ID.
/// On other platforms, uses the Bluetooth address.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Build a candidate from advertised properties.
///
/// Service data keys count as advertised services.
pub fn candidate_from_properties(
    identifier: impl Into<String>,
    properties: &PeripheralProperties,
) -> DeviceCandidate {
    let mut services = properties.services.clone();
    for uuid in properties.service_data.keys() {
        if !services.contains(uuid) {
            services.push(*uuid);
        }
    }

    DeviceCandidate {
        id: identifier.into(),
        name: properties.local_name.clone(),
        manufacturer_data: properties.manufacturer_data.clone(),
        services,
        rssi: properties.rssi,
    }
}

async fn check_peripheral(
    adapter: &Adapter,
    id: &PeripheralId,
    filter: &AdvertisementFilter,
) -> Result<Option<(Peripheral, DeviceCandidate)>> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let identifier = create_identifier(&properties.address.to_string(), id);
    let candidate = candidate_from_properties(identifier, &properties);
    if filter.matches(&candidate) {
        Ok(Some((peripheral, candidate)))
    } else {
        Ok(None)
    }
}

/// Scan until a matching advertisement is seen or `timeout` elapses.
///
/// Only peripherals that advertise during this scan are considered, so a
/// device the adapter still remembers but which is out of range is never
/// returned. The scan is stopped before returning.
pub async fn scan_for_target(
    adapter: &Adapter,
    filter: &AdvertisementFilter,
    timeout: Duration,
) -> Result<Option<(Peripheral, DeviceCandidate)>> {
    let deadline = Instant::now() + timeout;
    let events = adapter.events().await?;

    info!("Scanning for {:.1}s...", timeout.as_secs_f64());
    adapter.start_scan(ScanFilter::default()).await?;

    let ids = events.filter_map(|event| future::ready(advertised_id(event)));
    let found = first_match(ids, deadline, move |id| async move {
        check_peripheral(adapter, &id, filter).await
    })
    .await;

    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }
    Ok(found)
}

/// Peripheral an advertisement event refers to.
fn advertised_id(event: CentralEvent) -> Option<PeripheralId> {
    match event {
        CentralEvent::DeviceDiscovered(id)
        | CentralEvent::DeviceUpdated(id)
        | CentralEvent::ManufacturerDataAdvertisement { id, .. }
        | CentralEvent::ServiceDataAdvertisement { id, .. }
        | CentralEvent::ServicesAdvertisement { id, .. } => Some(id),
        _ => None,
    }
}

/// Check each id from `ids` until one matches or `deadline` passes.
///
/// A failed check is logged and skipped.
async fn first_match<S, K, V, F, Fut>(mut ids: S, deadline: Instant, mut check: F) -> Option<V>
where
    S: Stream<Item = K> + Unpin,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<Option<V>>>,
{
    loop {
        let id = match timeout_at(deadline, ids.next()).await {
            Ok(Some(id)) => id,
            Ok(None) | Err(_) => return None,
        };

        match check(id).await {
            Ok(Some(found)) => return Some(found),
            Ok(None) => {}
            Err(e) => debug!("Error processing peripheral: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swingsense_types::uuids::IMU_SERVICE;

    #[test]
    fn test_candidate_from_properties() {
        let mut properties = PeripheralProperties::default();
        properties.local_name = Some("SwingSense".to_string());
        properties.rssi = Some(-60);
        properties.manufacturer_data.insert(0x3412, Vec::new());
        properties.service_data.insert(IMU_SERVICE, vec![0x00]);

        let candidate = candidate_from_properties("AA:BB:CC:DD:EE:FF", &properties);
        assert_eq!(candidate.id, "AA:BB:CC:DD:EE:FF");
        assert_eq!(candidate.name.as_deref(), Some("SwingSense"));
        assert_eq!(candidate.rssi, Some(-60));
        assert_eq!(candidate.services, vec![IMU_SERVICE]);
        assert!(AdvertisementFilter::default().matches(&candidate));
    }

    #[test]
    fn test_service_data_not_duplicated() {
        let mut properties = PeripheralProperties::default();
        properties.services.push(IMU_SERVICE);
        properties.service_data.insert(IMU_SERVICE, Vec::new());

        let candidate = candidate_from_properties("id", &properties);
        assert_eq!(candidate.services.len(), 1);
    }

    #[test]
    fn test_empty_properties_do_not_match() {
        let candidate = candidate_from_properties("id", &PeripheralProperties::default());
        assert!(!AdvertisementFilter::default().matches(&candidate));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_skips_failed_checks() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let ids = futures::stream::iter(vec![1u32, 2, 3, 4]);
        let mut checked = Vec::new();
        let found = first_match(ids, deadline, |id| {
            checked.push(id);
            async move {
                match id {
                    1 => Err(Error::NotConnected),
                    2 => Ok(None),
                    _ => Ok(Some(id)),
                }
            }
        })
        .await;

        assert_eq!(found, Some(3));
        assert_eq!(checked, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_gives_up_at_deadline() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let found: Option<u32> = first_match(
            futures::stream::pending::<u32>(),
            deadline,
            |id| async move { Ok(Some(id)) },
        )
        .await;
        assert_eq!(found, None);
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test]
    async fn test_first_match_ends_with_stream() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let ids = futures::stream::iter(vec![1u32, 2]);
        let found: Option<u32> = first_match(ids, deadline, |_| async { Ok(None) }).await;
        assert_eq!(found, None);
    }
}
