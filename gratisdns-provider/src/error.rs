use serde::Serialize;
use thiserror::Error;

/// Unified error type for every portal operation.
///
/// The variants follow the lifecycle of a challenge: transport problems,
/// authentication failures, zone resolution, and record management.
/// All variants are serializable for structured error reporting.
///
/// # Fatal vs. recoverable
///
/// Everything raised while performing a challenge aborts the issuance attempt.
/// [`RecordDeletionFailed`](Self::RecordDeletionFailed) is the only variant the
/// orchestrator downgrades to a warning, because issuance has already succeeded
/// by the time cleanup runs.
///
/// Nothing in this crate retries. [`is_transient`](Self::is_transient) tells the
/// caller which failures are worth retrying on its side.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ChallengeError {
    /// Network failure, or an HTTP status outside 2xx/3xx.
    #[error("Transport error: {detail}")]
    Transport {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error details.
        detail: String,
    },

    /// The request exceeded the configured timeout.
    #[error("Request timeout: {detail}")]
    Timeout {
        /// Error details.
        detail: String,
    },

    /// The portal did not accept the login.
    #[error("Authentication rejected for '{username}': {reason}")]
    AuthenticationRejected {
        /// Account that attempted to log in.
        username: String,
        /// Which step of the login failed.
        reason: String,
    },

    /// The portal asked for a one-time code but no OTP secret is configured.
    #[error("Portal requires a one-time code for '{username}' but no OTP secret is configured")]
    MissingOtpSecret {
        /// Account that attempted to log in.
        username: String,
    },

    /// The configured OTP secret is not valid base32.
    #[error("Invalid OTP secret: {detail}")]
    InvalidOtpSecret {
        /// Decoder error.
        detail: String,
    },

    /// The authenticated session lapsed mid-run. The run fails instead of logging in again.
    #[error("Portal session expired")]
    SessionExpired,

    /// A portal page was requested before the login completed.
    #[error("Portal session is not authenticated")]
    NotAuthenticated,

    /// No zone registered in the account is a suffix of the name.
    #[error("No zone in the account matches '{fqdn}'")]
    NoMatchingZone {
        /// Fully-qualified name that was looked up.
        fqdn: String,
    },

    /// The portal did not confirm creation of the TXT record.
    #[error("Failed to create TXT record '{record_name}' in zone '{zone_id}': {reason}")]
    RecordCreationFailed {
        /// Zone the record was submitted to.
        zone_id: String,
        /// Relative record name.
        record_name: String,
        /// What went wrong.
        reason: String,
    },

    /// The portal did not confirm deletion of the TXT record.
    #[error("Failed to delete TXT record {record_id} in zone '{zone_id}': {reason}")]
    RecordDeletionFailed {
        /// Zone the record lives in.
        zone_id: String,
        /// Provider-assigned record id.
        record_id: String,
        /// What went wrong.
        reason: String,
    },

    /// An element the portal adapter relies on was not found in a page.
    #[error("Portal markup changed: {detail}")]
    MarkupChanged {
        /// Which element was missing.
        detail: String,
    },

    /// Configuration is incomplete or malformed.
    #[error("Invalid configuration: {detail}")]
    InvalidConfig {
        /// What is wrong.
        detail: String,
    },
}

impl ChallengeError {
    /// Failures that may succeed if the caller tries again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// 是否为预期行为（配置错误、账户不匹配等），用于日志分级。
    ///
    /// 返回 `true` 时应使用 `warn` 级别，`false` 时使用 `error` 级别。
    /// **新增变体时请同步更新此方法。**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRejected { .. }
                | Self::MissingOtpSecret { .. }
                | Self::InvalidOtpSecret { .. }
                | Self::NoMatchingZone { .. }
                | Self::RecordDeletionFailed { .. }
                | Self::InvalidConfig { .. }
        )
    }

    pub(crate) fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            detail: detail.into(),
        }
    }

    pub(crate) fn markup(detail: impl Into<String>) -> Self {
        Self::MarkupChanged {
            detail: detail.into(),
        }
    }

    pub(crate) fn config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }
}

/// Convenience type alias for `Result<T, ChallengeError>`.
pub type Result<T> = std::result::Result<T, ChallengeError>;
