//! Portal HTTP transport
//!
//! [`PortalTransport`] is the seam between the portal state machine and the
//! network. [`ReqwestTransport`] is the live implementation; tests plug in an
//! in-memory portal instead.
//!
//! # design principles
//! - **Cookies live in the transport** - one transport is one browser session
//! - **No retries** - a failed request fails the operation; retry policy belongs to the caller
//! - **Status is not judged here** - the session decides which statuses are acceptable

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ChallengeConfig;
use crate::error::{ChallengeError, Result};
use crate::types::{Method, PortalRequest, PortalResponse};
use crate::utils::log_sanitizer::{redact_params, truncate_for_log};

const USER_AGENT: &str = concat!("gratisdns-provider/", env!("CARGO_PKG_VERSION"));

/// Sends one request to the portal and returns the raw response.
#[async_trait]
pub trait PortalTransport: Send + Sync {
    async fn send(&self, request: &PortalRequest) -> Result<PortalResponse>;
}

/// `reqwest`-backed transport with its own cookie jar.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ChallengeConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChallengeError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/", self.base_url)
    }
}

#[async_trait]
impl PortalTransport for ReqwestTransport {
    async fn send(&self, request: &PortalRequest) -> Result<PortalResponse> {
        log::debug!(
            "[gratisdns] {} ({})",
            request.describe(),
            redact_params(&request.params)
        );

        let action: Vec<(&str, &str)> = request
            .action
            .as_deref()
            .map(|a| vec![("action", a)])
            .unwrap_or_default();

        let builder = match request.method {
            Method::Get => self
                .client
                .get(self.endpoint())
                .query(&action)
                .query(&request.params),
            Method::Post => {
                let mut form: Vec<(&str, &str)> = action;
                form.extend(request.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                self.client.post(self.endpoint()).form(&form)
            }
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ChallengeError::Timeout {
                    detail: e.to_string(),
                }
            } else {
                ChallengeError::transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        log::debug!("[gratisdns] Response Status: {status}");

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(|e| ChallengeError::Transport {
            status: Some(status),
            detail: format!("Failed to read response body: {e}"),
        })?;

        log::debug!("[gratisdns] Response Body: {}", truncate_for_log(&body));

        Ok(PortalResponse {
            status,
            body,
            headers,
        })
    }
}
