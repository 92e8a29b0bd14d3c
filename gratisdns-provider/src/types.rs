use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ChallengeError;

// ============ Portal request/response ============

/// HTTP method used against the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A single request against the portal.
///
/// The portal multiplexes every page through one endpoint selected by the
/// `action` parameter, so a request is an action plus its parameters. For
/// `GET` they go into the query string, for `POST` into the form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    pub method: Method,
    /// Value of the `action` parameter. `None` requests the portal root.
    pub action: Option<String>,
    pub params: Vec<(String, String)>,
}

impl PortalRequest {
    pub fn get(action: Option<&str>) -> Self {
        Self {
            method: Method::Get,
            action: action.map(str::to_string),
            params: Vec::new(),
        }
    }

    pub fn post(action: &str) -> Self {
        Self {
            method: Method::Post,
            action: Some(action.to_string()),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Append a parameter when a value is present.
    #[must_use]
    pub fn param_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    /// Look up a parameter by name (including `action`).
    pub fn get_param(&self, key: &str) -> Option<&str> {
        if key == "action" {
            return self.action.as_deref();
        }
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Short description for logs; parameter values are left out on purpose
    /// since login forms carry the password.
    pub fn describe(&self) -> String {
        format!(
            "{} action={}",
            self.method,
            self.action.as_deref().unwrap_or("<root>")
        )
    }
}

/// Raw portal response.
#[derive(Debug, Clone, Default)]
pub struct PortalResponse {
    pub status: u16,
    pub body: String,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
}

impl PortalResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The body is a page the markup extractors can read. A response without
    /// a content type is taken as HTML.
    pub fn is_html(&self) -> bool {
        self.header("content-type")
            .is_none_or(|ct| ct.to_ascii_lowercase().contains("html"))
    }

    /// 2xx or 3xx.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

// ============ Authentication ============

/// Login progress of a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    CredentialsSubmitted,
    OtpRequired,
    Authenticated,
    /// The portal refused the login. Terminal.
    Rejected,
    /// An authenticated session lapsed. Terminal.
    Expired,
}

impl AuthState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Expired)
    }
}

// ============ Zones & records ============

/// A DNS zone registered in the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    /// Provider-assigned identifier.
    pub id: String,
    /// Apex domain of the zone, lower-case without trailing dot.
    pub apex: String,
}

/// A TXT row as listed on the zone's records page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxtRecord {
    pub id: String,
    /// Host name as displayed by the portal (may be fully qualified).
    pub name: String,
    pub value: String,
}

/// A TXT record this process created for one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeRecord {
    pub zone_id: String,
    /// Name relative to the zone apex; empty for the apex itself.
    pub record_name: String,
    pub record_value: String,
    pub record_id: String,
}

// ============ Challenge input ============

/// What the certificate client hands over for a DNS-01 challenge.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ChallengeToken {
    /// The ACME key authorization (`token.thumbprint`). The record value is
    /// its SHA-256 digest, base64url-encoded without padding.
    KeyAuthorization(String),
    /// A value that is already the TXT record content.
    Validation(String),
}

impl ChallengeToken {
    /// Content of the TXT record satisfying this challenge.
    pub fn record_value(&self) -> String {
        match self {
            Self::KeyAuthorization(key_authz) => {
                URL_SAFE_NO_PAD.encode(Sha256::digest(key_authz.as_bytes()))
            }
            Self::Validation(value) => value.clone(),
        }
    }
}

impl fmt::Debug for ChallengeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyAuthorization(_) => f.write_str("KeyAuthorization(..)"),
            Self::Validation(v) => f.debug_tuple("Validation").field(v).finish(),
        }
    }
}

// ============ Outcomes ============

/// Result of [`ChallengeOrchestrator::cleanup`](crate::ChallengeOrchestrator::cleanup).
#[derive(Debug, Clone, Serialize)]
pub enum CleanupOutcome {
    /// No record was created for this (domain, token) pair in this run.
    NotTracked,
    /// The tracked record was deleted.
    Deleted(ChallengeRecord),
    /// Deletion failed; the record is left behind in the zone.
    Orphaned {
        record: ChallengeRecord,
        error: ChallengeError,
    },
}

impl CleanupOutcome {
    pub fn is_orphaned(&self) -> bool {
        matches!(self, Self::Orphaned { .. })
    }
}

/// Result of [`ChallengeOrchestrator::purge`](crate::ChallengeOrchestrator::purge).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurgeReport {
    pub deleted: Vec<String>,
    pub failures: Vec<PurgeFailure>,
}

/// A record [`purge`](crate::ChallengeOrchestrator::purge) could not delete.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeFailure {
    pub record_id: String,
    pub reason: String,
}
