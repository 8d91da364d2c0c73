//! Target selection from advertisement data.
//!
//! A peripheral is accepted when any of its advertised markers matches: the
//! vendor prefix in manufacturer data, the device name, or the IMU service.
//! The first match wins; there is no ranking among visible candidates.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use swingsense_types::uuids::{DEVICE_NAME, IMU_SERVICE, SERVICE_HINT, VENDOR_PREFIX};

use crate::transport::Transport;

/// A device seen during a scan that matched the filter.
///
/// Produced by discovery and consumed once by the supervisor's connection
/// attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCandidate {
    /// Transport-assigned identifier (peripheral ID or address).
    pub id: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Manufacturer-specific data keyed by company identifier.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
    /// Signal strength at the time of the scan.
    pub rssi: Option<i16>,
}

impl DeviceCandidate {
    /// Create a candidate with only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the advertised name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a manufacturer data entry.
    pub fn with_manufacturer_data(mut self, company_id: u16, payload: impl Into<Vec<u8>>) -> Self {
        self.manufacturer_data.insert(company_id, payload.into());
        self
    }

    /// Add an advertised service.
    pub fn with_service(mut self, service: Uuid) -> Self {
        self.services.push(service);
        self
    }

    /// Name for log lines: the advertised name, else the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Predicate deciding whether an advertisement belongs to the target peripheral.
#[derive(Debug, Clone)]
pub struct AdvertisementFilter {
    /// Leading bytes of the manufacturer data.
    pub vendor_prefix: Vec<u8>,
    /// Substring of the advertised local name.
    pub name_fragment: String,
    /// Substring matched case-insensitively against service UUID strings.
    pub service_hint: String,
    /// Service UUID accepted on exact match.
    pub service: Uuid,
}

impl Default for AdvertisementFilter {
    fn default() -> Self {
        Self {
            vendor_prefix: VENDOR_PREFIX.to_vec(),
            name_fragment: DEVICE_NAME.to_string(),
            service_hint: SERVICE_HINT.to_string(),
            service: IMU_SERVICE,
        }
    }
}

impl AdvertisementFilter {
    /// Whether `candidate` advertises any of the target markers.
    pub fn matches(&self, candidate: &DeviceCandidate) -> bool {
        self.matches_vendor(&candidate.manufacturer_data)
            || self.matches_name(candidate.name.as_deref())
            || self.matches_services(&candidate.services)
    }

    fn matches_vendor(&self, manufacturer_data: &HashMap<u16, Vec<u8>>) -> bool {
        if self.vendor_prefix.is_empty() {
            return false;
        }
        manufacturer_data.iter().any(|(company_id, payload)| {
            if payload.starts_with(&self.vendor_prefix) {
                return true;
            }
            // The stack strips the first two bytes of the raw field as the
            // company identifier; rebuild the field before comparing.
            let mut raw = company_id.to_le_bytes().to_vec();
            raw.extend_from_slice(payload);
            raw.starts_with(&self.vendor_prefix)
        })
    }

    fn matches_name(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) if !self.name_fragment.is_empty() => name.contains(&self.name_fragment),
            _ => false,
        }
    }

    fn matches_services(&self, services: &[Uuid]) -> bool {
        let hint = self.service_hint.to_lowercase();
        services.iter().any(|service| {
            *service == self.service
                || (!hint.is_empty() && service.to_string().to_lowercase().contains(&hint))
        })
    }
}

/// Scan for the target peripheral for at most `timeout`.
///
/// Scanner failures are logged and reported as `None`, the same as a timeout.
pub async fn find_target<T: Transport + ?Sized>(
    transport: &T,
    filter: &AdvertisementFilter,
    timeout: Duration,
) -> Option<DeviceCandidate> {
    match transport.scan(filter, timeout).await {
        Ok(Some(candidate)) => {
            debug!(
                id = %candidate.id,
                name = candidate.display_name(),
                rssi = ?candidate.rssi,
                "Target matched advertisement filter"
            );
            Some(candidate)
        }
        Ok(None) => {
            debug!("No target found within {:?}", timeout);
            None
        }
        Err(e) => {
            warn!("Scan failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::uuid;

    #[test]
    fn test_matches_vendor_prefix_payload() {
        let filter = AdvertisementFilter::default();
        let candidate = DeviceCandidate::new("a").with_manufacturer_data(0xFFFF, [0x12, 0x34, 0x00]);
        assert!(filter.matches(&candidate));
    }

    #[test]
    fn test_matches_vendor_prefix_in_company_id() {
        // Raw field [0x12, 0x34] arrives as company id 0x3412 with an empty payload.
        let filter = AdvertisementFilter::default();
        let candidate = DeviceCandidate::new("a").with_manufacturer_data(0x3412, Vec::new());
        assert!(filter.matches(&candidate));
    }

    #[test]
    fn test_rejects_other_manufacturer_data() {
        let filter = AdvertisementFilter::default();
        let candidate = DeviceCandidate::new("a").with_manufacturer_data(0x004C, [0x02, 0x15]);
        assert!(!filter.matches(&candidate));

        // Byte order matters.
        let candidate = DeviceCandidate::new("a").with_manufacturer_data(0x1234, Vec::new());
        assert!(!filter.matches(&candidate));
    }

    #[test]
    fn test_matches_name_substring() {
        let filter = AdvertisementFilter::default();
        assert!(filter.matches(&DeviceCandidate::new("a").with_name("SwingSense")));
        assert!(filter.matches(&DeviceCandidate::new("a").with_name("My SwingSense 2")));
        assert!(!filter.matches(&DeviceCandidate::new("a").with_name("swingsense")));
        assert!(!filter.matches(&DeviceCandidate::new("a").with_name("Polar H10")));
    }

    #[test]
    fn test_matches_service_hint_case_insensitive() {
        let filter = AdvertisementFilter::default();
        let upper = Uuid::parse_str("0000FF00-0000-1000-8000-00805F9B34FB").unwrap();
        assert!(filter.matches(&DeviceCandidate::new("a").with_service(upper)));

        let custom = uuid!("12345678-ff00-4000-8000-000000000000");
        assert!(filter.matches(&DeviceCandidate::new("a").with_service(custom)));

        let heart_rate = uuid!("0000180d-0000-1000-8000-00805f9b34fb");
        assert!(!filter.matches(&DeviceCandidate::new("a").with_service(heart_rate)));
    }

    #[test]
    fn test_matches_exact_service_without_hint() {
        let filter = AdvertisementFilter {
            service_hint: String::new(),
            ..Default::default()
        };
        assert!(filter.matches(&DeviceCandidate::new("a").with_service(IMU_SERVICE)));
        let other = uuid!("12345678-ff00-4000-8000-000000000000");
        assert!(!filter.matches(&DeviceCandidate::new("a").with_service(other)));
    }

    #[test]
    fn test_empty_advertisement_rejected() {
        assert!(!AdvertisementFilter::default().matches(&DeviceCandidate::new("a")));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(DeviceCandidate::new("AA:BB").display_name(), "AA:BB");
        assert_eq!(
            DeviceCandidate::new("AA:BB").with_name("SwingSense").display_name(),
            "SwingSense"
        );
    }
}
