//! Credentials and run configuration

use std::fmt;
use std::time::Duration;

use crate::error::{ChallengeError, Result};
use crate::markup::GRATISDNS_BASE_URL;
use crate::totp::TotpSecret;

/// GratisDNS needs roughly eleven minutes before a new record is served.
pub const DEFAULT_SETTLE_SECS: u64 = 660;
pub const DEFAULT_TTL: u32 = 60;
pub const DEFAULT_RECORD_PREFIX: &str = "_acme-challenge";
/// 默认连接超时（秒）
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Prefix certbot puts in front of plugin credential keys.
const CERTBOT_KEY_PREFIX: &str = "dns_gratisdns_";

// ============ Credentials ============

/// Portal login. Immutable for the lifetime of the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Base32 TOTP secret, if the account has two-factor login enabled.
    pub otp_secret: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        otp_secret: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            otp_secret: otp_secret.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Build from configuration key-value pairs.
    ///
    /// Accepts `username`, `password` and `otp_secret`. `otp-secret` and a
    /// `dns_gratisdns_` prefix are understood too, so certbot credential files
    /// work unchanged. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut username = None;
        let mut password = None;
        let mut otp_secret = None;

        for (key, value) in pairs {
            let key = key.as_ref().trim();
            let key = key.strip_prefix(CERTBOT_KEY_PREFIX).unwrap_or(key);
            match key.replace('-', "_").as_str() {
                "username" => username = Some(value.into()),
                "password" => password = Some(value.into()),
                "otp_secret" => otp_secret = Some(value.into()),
                other => log::debug!("Ignoring unknown credential key '{other}'"),
            }
        }

        let username = username
            .filter(|u: &String| !u.trim().is_empty())
            .ok_or_else(|| ChallengeError::config("missing 'username'"))?;
        let password = password
            .filter(|p: &String| !p.is_empty())
            .ok_or_else(|| ChallengeError::config("missing 'password'"))?;

        Ok(Self::new(username.trim(), password, otp_secret))
    }

    /// Decode the OTP secret, if one is configured.
    pub fn totp(&self) -> Result<Option<TotpSecret>> {
        self.otp_secret
            .as_deref()
            .map(TotpSecret::from_base32)
            .transpose()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("otp_secret", &self.otp_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

// ============ ChallengeConfig ============

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    pub base_url: String,
    /// Wait after creating a record before `perform` returns.
    pub settle_interval: Duration,
    pub ttl: u32,
    pub record_prefix: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ChallengeConfig {
    pub fn builder() -> ChallengeConfigBuilder {
        ChallengeConfigBuilder::new()
    }
}

/// [`ChallengeConfig`] Builder
pub struct ChallengeConfigBuilder {
    base_url: String,
    settle_interval: Duration,
    ttl: u32,
    record_prefix: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ChallengeConfigBuilder {
    fn new() -> Self {
        Self {
            base_url: GRATISDNS_BASE_URL.to_string(),
            settle_interval: Duration::from_secs(DEFAULT_SETTLE_SECS),
            ttl: DEFAULT_TTL,
            record_prefix: DEFAULT_RECORD_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn record_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.record_prefix = prefix.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ChallengeConfig {
        ChallengeConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            settle_interval: self.settle_interval,
            ttl: self.ttl,
            record_prefix: self.record_prefix.trim_matches('.').to_string(),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        }
    }
}
