//! Map a fully-qualified name onto a zone of the account

use serde::Serialize;

use crate::error::{ChallengeError, Result};
use crate::markup::{self, ACTION_ZONE_LIST};
use crate::session::Session;
use crate::types::{PortalRequest, Zone};

/// A name split into the zone that hosts it and the part left of the apex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneMatch {
    pub zone: Zone,
    /// Empty when the name is the apex itself.
    pub record_name: String,
}

/// Finds the most specific zone for a name.
///
/// The zone list is fetched once per session and cached there.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneResolver;

impl ZoneResolver {
    pub fn new() -> Self {
        Self
    }

    /// Zones registered in the account.
    pub async fn list_zones(&self, session: &mut Session) -> Result<Vec<Zone>> {
        if let Some(zones) = session.cached_zones() {
            return Ok(zones.to_vec());
        }

        let response = session
            .authenticated_request(PortalRequest::get(Some(ACTION_ZONE_LIST)))
            .await?;
        let zones = markup::parse_zones(&response.body);
        if zones.is_empty() {
            log::warn!("[gratisdns] No zones found in the account");
        } else {
            log::info!("[gratisdns] Found {} zone(s) in the account", zones.len());
        }

        session.cache_zones(zones.clone());
        Ok(zones)
    }

    /// Resolve `fqdn` to its zone and relative record name.
    pub async fn resolve(&self, session: &mut Session, fqdn: &str) -> Result<ZoneMatch> {
        let zones = self.list_zones(session).await?;
        let found = find_zone(&zones, fqdn).ok_or_else(|| ChallengeError::NoMatchingZone {
            fqdn: markup::normalize_name(fqdn),
        })?;
        log::debug!(
            "[gratisdns] '{fqdn}' resolved to zone '{}' with name '{}'",
            found.zone.id,
            found.record_name
        );
        Ok(found)
    }
}

/// Longest-suffix match of `fqdn` against `zones`, on whole labels.
///
/// Comparison ignores case and a trailing dot.
pub fn find_zone(zones: &[Zone], fqdn: &str) -> Option<ZoneMatch> {
    let name = markup::normalize_name(fqdn);
    if name.is_empty() {
        return None;
    }
    let labels: Vec<&str> = name.split('.').collect();

    (0..labels.len()).find_map(|i| {
        let candidate = labels[i..].join(".");
        zones.iter().find(|z| z.apex == candidate).map(|zone| ZoneMatch {
            zone: zone.clone(),
            record_name: labels[..i].join("."),
        })
    })
}
