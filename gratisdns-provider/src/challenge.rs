//! DNS-01 challenge lifecycle: perform, cleanup, purge

use std::collections::HashMap;

use crate::auth::Authenticator;
use crate::config::{ChallengeConfig, Credentials};
use crate::error::{ChallengeError, Result};
use crate::markup;
use crate::records::RecordManager;
use crate::session::Session;
use crate::types::{ChallengeRecord, ChallengeToken, CleanupOutcome, PurgeFailure, PurgeReport};
use crate::zones::{ZoneMatch, ZoneResolver};

/// Identifies one challenge: the requested domain plus the record value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChallengeKey {
    domain: String,
    record_value: String,
}

impl ChallengeKey {
    fn new(domain: &str, record_value: String) -> Self {
        Self {
            domain: markup::normalize_name(domain),
            record_value,
        }
    }
}

/// Places and removes the TXT records for DNS-01 challenges.
///
/// One orchestrator owns one portal session and logs in lazily on the first
/// `perform`. All methods take `&mut self`, so a run is strictly sequential.
///
/// # Example
///
/// ```rust,no_run
/// use gratisdns_provider::{ChallengeConfig, ChallengeOrchestrator, ChallengeToken, Credentials};
///
/// # async fn run() -> gratisdns_provider::Result<()> {
/// let credentials = Credentials::new("alice", "secret", None);
/// let mut orchestrator = ChallengeOrchestrator::new(credentials, ChallengeConfig::default())?;
///
/// let token = ChallengeToken::Validation("gfj9Xq...Rg85nM".to_string());
/// orchestrator.perform("*.example.com", &token).await?;
/// // ... the CA validates ...
/// orchestrator.cleanup("*.example.com", &token).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChallengeOrchestrator {
    config: ChallengeConfig,
    authenticator: Authenticator,
    session: Session,
    zones: ZoneResolver,
    records: RecordManager,
    tracked: HashMap<ChallengeKey, ChallengeRecord>,
    orphans: Vec<ChallengeRecord>,
}

impl ChallengeOrchestrator {
    /// Orchestrator over the live portal at `config.base_url`.
    pub fn new(credentials: Credentials, config: ChallengeConfig) -> Result<Self> {
        let session = Session::connect(&config)?;
        Ok(Self::with_session(credentials, config, session))
    }

    /// Orchestrator over an existing, not yet authenticated session.
    pub fn with_session(credentials: Credentials, config: ChallengeConfig, session: Session) -> Self {
        Self {
            records: RecordManager::new(config.ttl),
            config,
            authenticator: Authenticator::new(credentials),
            session,
            zones: ZoneResolver::new(),
            tracked: HashMap::new(),
            orphans: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Name the TXT record must be published at for `domain`.
    ///
    /// A wildcard label is dropped: `*.example.com` and `example.com` share
    /// `_acme-challenge.example.com`.
    pub fn validation_name(&self, domain: &str) -> String {
        let domain = markup::normalize_name(domain);
        let base = domain.strip_prefix("*.").unwrap_or(&domain);
        format!("{}.{base}", self.config.record_prefix)
    }

    /// Records created in this run and not yet cleaned up.
    pub fn tracked_records(&self) -> impl Iterator<Item = &ChallengeRecord> {
        self.tracked.values()
    }

    /// Records whose deletion failed during cleanup.
    pub fn orphaned_records(&self) -> &[ChallengeRecord] {
        &self.orphans
    }

    /// Publish the TXT record for `domain` and wait for it to propagate.
    ///
    /// Calling again for a (domain, token) pair that is already in place
    /// returns the existing record without touching the portal.
    pub async fn perform(&mut self, domain: &str, token: &ChallengeToken) -> Result<ChallengeRecord> {
        let record_value = token.record_value();
        let key = ChallengeKey::new(domain, record_value.clone());
        if let Some(existing) = self.tracked.get(&key) {
            log::info!(
                "[gratisdns] Challenge record for '{domain}' already in place ({})",
                existing.record_id
            );
            return Ok(existing.clone());
        }

        self.authenticator.login(&mut self.session).await?;

        let fqdn = self.validation_name(domain);
        let ZoneMatch { zone, record_name } = self.zones.resolve(&mut self.session, &fqdn).await?;
        let claimed: Vec<String> = self
            .tracked
            .values()
            .filter(|r| r.zone_id == zone.id)
            .map(|r| r.record_id.clone())
            .collect();
        let record_id = self
            .records
            .create(&mut self.session, &zone, &record_name, &record_value, &claimed)
            .await?;

        let record = ChallengeRecord {
            zone_id: zone.id,
            record_name,
            record_value,
            record_id,
        };
        self.tracked.insert(key, record.clone());

        let settle = self.config.settle_interval;
        if !settle.is_zero() {
            log::info!(
                "[gratisdns] Waiting {}s for '{fqdn}' to propagate",
                settle.as_secs()
            );
            tokio::time::sleep(settle).await;
        }

        Ok(record)
    }

    /// Remove the record `perform` created for this (domain, token) pair.
    ///
    /// Never fails: a deletion error turns the record into an orphan, which
    /// is logged and reported but does not undo a successful issuance.
    pub async fn cleanup(&mut self, domain: &str, token: &ChallengeToken) -> CleanupOutcome {
        let key = ChallengeKey::new(domain, token.record_value());
        let Some(record) = self.tracked.remove(&key) else {
            log::debug!("[gratisdns] No challenge record tracked for '{domain}', nothing to clean up");
            return CleanupOutcome::NotTracked;
        };

        match self.delete_tracked(domain, &record).await {
            Ok(()) => CleanupOutcome::Deleted(record),
            Err(error) => {
                log::warn!(
                    "[gratisdns] Could not delete TXT record {} in zone '{}', left behind: {error}",
                    record.record_id,
                    record.zone_id
                );
                self.orphans.push(record.clone());
                CleanupOutcome::Orphaned { record, error }
            }
        }
    }

    async fn delete_tracked(&mut self, domain: &str, record: &ChallengeRecord) -> Result<()> {
        self.authenticator.login(&mut self.session).await?;

        let fqdn = self.validation_name(domain);
        let resolved = self.zones.resolve(&mut self.session, &fqdn).await?;
        if resolved.zone.id != record.zone_id || resolved.record_name != record.record_name {
            log::warn!(
                "[gratisdns] '{fqdn}' now resolves to zone '{}', deleting the tracked record in '{}'",
                resolved.zone.id,
                record.zone_id
            );
        }

        self.records
            .delete(&mut self.session, &record.zone_id, &record.record_id)
            .await
    }

    /// Delete every record at the validation name of `domain` holding the
    /// token's value, whether or not this process created it.
    ///
    /// For hooks where `perform` ran in another process. Individual deletion
    /// failures are collected in the report; login and lookup failures abort.
    pub async fn purge(&mut self, domain: &str, token: &ChallengeToken) -> Result<PurgeReport> {
        let record_value = token.record_value();
        self.authenticator.login(&mut self.session).await?;

        let fqdn = self.validation_name(domain);
        let ZoneMatch { zone, record_name } = self.zones.resolve(&mut self.session, &fqdn).await?;
        let ids = self
            .records
            .find(&mut self.session, &zone, &record_name, &record_value)
            .await?;
        if ids.is_empty() {
            log::info!("[gratisdns] No TXT record at '{fqdn}' with the challenge value");
        }

        let mut report = PurgeReport::default();
        for id in ids {
            match self.records.delete(&mut self.session, &zone.id, &id).await {
                Ok(()) => report.deleted.push(id),
                Err(e @ ChallengeError::SessionExpired) => return Err(e),
                Err(e) => {
                    log::warn!("[gratisdns] Could not delete TXT record {id}: {e}");
                    report.failures.push(PurgeFailure {
                        record_id: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.tracked
            .retain(|_, r| !(r.zone_id == zone.id && report.deleted.contains(&r.record_id)));
        Ok(report)
    }
}
