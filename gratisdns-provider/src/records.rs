//! TXT record create/find/delete through the portal forms

use crate::error::{ChallengeError, Result};
use crate::markup::{
    self, ACTION_ADD_TXT, ACTION_ADD_TXT_FORM, ACTION_DELETE_TXT, ACTION_RECORDS, FIELD_RECORD_ID,
    FIELD_RECORD_NAME, FIELD_TOKEN, FIELD_TTL, FIELD_TXT_DATA, FIELD_ZONE,
};
use crate::session::Session;
use crate::types::{PortalRequest, TxtRecord, Zone};

/// Creates and deletes TXT records.
///
/// The portal does not return an id when a record is added, so `create`
/// lists the zone before and after and takes the id that appeared.
#[derive(Debug, Clone, Copy)]
pub struct RecordManager {
    ttl: u32,
}

impl RecordManager {
    pub fn new(ttl: u32) -> Self {
        Self { ttl }
    }

    /// TXT records of the zone, as listed on its records page.
    pub async fn list(&self, session: &mut Session, zone_id: &str) -> Result<Vec<TxtRecord>> {
        let response = session
            .authenticated_request(records_page(zone_id))
            .await?;
        Ok(markup::parse_txt_records(&response.body))
    }

    /// Ids of the records with this name and value, in page order.
    pub async fn find(
        &self,
        session: &mut Session,
        zone: &Zone,
        record_name: &str,
        record_value: &str,
    ) -> Result<Vec<String>> {
        let records = self.list(session, &zone.id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.value == record_value && matches_name(&r.name, record_name, &zone.apex))
            .map(|r| r.id)
            .collect())
    }

    /// Add a TXT record and return the id the portal assigned to it.
    ///
    /// If the portal does not confirm the submission but an identical record
    /// already exists, that record is reused. Ids in `claimed` belong to other
    /// challenges and are never handed out again.
    pub async fn create(
        &self,
        session: &mut Session,
        zone: &Zone,
        record_name: &str,
        record_value: &str,
        claimed: &[String],
    ) -> Result<String> {
        let before = self.find(session, zone, record_name, record_value).await?;
        let reusable = before.iter().rev().find(|id| !claimed.contains(*id));

        session
            .authenticated_request(PortalRequest::get(Some(ACTION_ADD_TXT_FORM)).param(FIELD_ZONE, &zone.id))
            .await?;
        let token = session.take_token();

        let request = PortalRequest::post(ACTION_ADD_TXT)
            .param(FIELD_RECORD_NAME, record_name)
            .param(FIELD_TTL, self.ttl.to_string())
            .param(FIELD_TXT_DATA, record_value)
            .param(FIELD_ZONE, &zone.id)
            .param_opt(FIELD_TOKEN, token.as_deref());
        let response = session.authenticated_request(request).await?;

        let failure = |reason: String| ChallengeError::RecordCreationFailed {
            zone_id: zone.id.clone(),
            record_name: record_name.to_string(),
            reason,
        };

        if !markup::record_added(&response.body) {
            let reason = markup::error_message(&response.body)
                .unwrap_or_else(|| "portal did not confirm the new record".to_string());
            if let Some(existing) = reusable {
                log::warn!(
                    "[gratisdns] Add not confirmed ({reason}), reusing existing record {existing}"
                );
                return Ok(existing.clone());
            }
            return Err(failure(reason));
        }

        let after = self.find(session, zone, record_name, record_value).await?;
        let created = after
            .into_iter()
            .filter(|id| !before.contains(id) && !claimed.contains(id))
            .max_by_key(|id| id.parse::<u64>().unwrap_or_default());

        match (created, reusable) {
            (Some(id), _) => {
                log::info!(
                    "[gratisdns] Created TXT record {id} '{record_name}' in zone '{}'",
                    zone.id
                );
                Ok(id)
            }
            (None, Some(existing)) => {
                log::warn!("[gratisdns] No new record listed, reusing existing record {existing}");
                Ok(existing.clone())
            }
            (None, None) => Err(failure(
                "record confirmed but not found in the zone listing".to_string(),
            )),
        }
    }

    /// Delete a record by id.
    ///
    /// A record that is no longer listed counts as deleted.
    pub async fn delete(&self, session: &mut Session, zone_id: &str, record_id: &str) -> Result<()> {
        // The delete link needs a token from a freshly rendered records page.
        let records = self.list(session, zone_id).await?;
        if !records.iter().any(|r| r.id == record_id) {
            log::warn!("[gratisdns] TXT record {record_id} is no longer listed in zone '{zone_id}'");
            return Ok(());
        }
        let token = session.take_token();

        let request = PortalRequest::get(Some(ACTION_DELETE_TXT))
            .param(FIELD_RECORD_ID, record_id)
            .param(FIELD_ZONE, zone_id)
            .param_opt(FIELD_TOKEN, token.as_deref());
        let response = session.authenticated_request(request).await?;

        if markup::record_deleted(&response.body) {
            log::info!("[gratisdns] Deleted TXT record {record_id} in zone '{zone_id}'");
            Ok(())
        } else {
            Err(ChallengeError::RecordDeletionFailed {
                zone_id: zone_id.to_string(),
                record_id: record_id.to_string(),
                reason: markup::error_message(&response.body)
                    .unwrap_or_else(|| "portal did not confirm the deletion".to_string()),
            })
        }
    }
}

fn records_page(zone_id: &str) -> PortalRequest {
    PortalRequest::get(Some(ACTION_RECORDS)).param(FIELD_ZONE, zone_id)
}

/// Whether a host as displayed by the portal is `record_name` in the zone.
///
/// The portal may show the relative name, the full name, or `@` for the apex.
fn matches_name(displayed: &str, record_name: &str, apex: &str) -> bool {
    let displayed = markup::normalize_name(displayed);
    let relative = markup::normalize_name(record_name);
    if relative.is_empty() {
        return displayed == apex || displayed == "@";
    }
    displayed == relative || displayed == format!("{relative}.{apex}")
}
