//! # gratisdns-provider
//!
//! DNS-01 challenge automation for [GratisDNS](https://gratisdns.com/).
//!
//! GratisDNS offers no API. This crate drives the administration portal the
//! way a browser would: it logs in (optionally with a TOTP one-time code),
//! finds the zone hosting the validation name, adds the TXT record through the
//! portal's forms and removes it again after the CA has validated.
//!
//! ## Feature Flags
//!
//! - **`rustls`** *(default)*: Use rustls.
//! - **`native-tls`**: Use the platform's native TLS implementation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gratisdns_provider::{
//!     ChallengeConfig, ChallengeOrchestrator, ChallengeToken, CleanupOutcome, Credentials,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("alice", "secret", Some("JBSWY3DPEHPK3PXP".into()));
//!     let config = ChallengeConfig::builder().ttl(60).build();
//!     let mut orchestrator = ChallengeOrchestrator::new(credentials, config)?;
//!
//!     // 1. Publish the record (waits for propagation)
//!     let token = ChallengeToken::KeyAuthorization("token.thumbprint".to_string());
//!     let record = orchestrator.perform("*.example.com", &token).await?;
//!     println!("created {} in {}", record.record_id, record.zone_id);
//!
//!     // 2. Remove it once the CA has validated
//!     if let CleanupOutcome::Orphaned { record, error } =
//!         orchestrator.cleanup("*.example.com", &token).await
//!     {
//!         eprintln!("left behind {}: {error}", record.record_id);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All portal operations return [`Result<T, ChallengeError>`](ChallengeError).
//!
//! - [`ChallengeError::AuthenticationRejected`]: the portal refused the login
//! - [`ChallengeError::SessionExpired`]: the session lapsed mid-run (no re-login)
//! - [`ChallengeError::NoMatchingZone`]: no zone in the account hosts the name
//! - [`ChallengeError::MarkupChanged`]: the portal's pages no longer look as expected
//!
//! Nothing is retried. [`ChallengeError::is_transient`] marks the failures a
//! caller may want to retry.

mod auth;
mod challenge;
mod config;
mod error;
mod http_client;
pub mod markup;
mod records;
mod session;
mod totp;
mod types;
mod utils;
mod zones;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_utils;

// Re-export error types
pub use error::{ChallengeError, Result};

// Re-export the lifecycle components
pub use auth::Authenticator;
pub use challenge::ChallengeOrchestrator;
pub use records::RecordManager;
pub use session::Session;
pub use zones::{ZoneMatch, ZoneResolver, find_zone};

// Re-export configuration
pub use config::{
    ChallengeConfig, ChallengeConfigBuilder, Credentials, DEFAULT_RECORD_PREFIX,
    DEFAULT_SETTLE_SECS, DEFAULT_TTL,
};
pub use totp::TotpSecret;

// Re-export transport
pub use http_client::{PortalTransport, ReqwestTransport};

// Re-export types
pub use types::{
    AuthState, ChallengeRecord, ChallengeToken, CleanupOutcome, Method, PortalRequest,
    PortalResponse, PurgeFailure, PurgeReport, TxtRecord, Zone,
};
