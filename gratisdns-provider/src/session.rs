//! Portal session: cookie-carrying transport plus login state

use std::fmt;

use crate::config::ChallengeConfig;
use crate::error::{ChallengeError, Result};
use crate::http_client::{PortalTransport, ReqwestTransport};
use crate::markup;
use crate::types::{AuthState, PortalRequest, PortalResponse, Zone};

/// One browser-like session against the portal.
///
/// Created unauthenticated, driven to [`AuthState::Authenticated`] by the
/// [`Authenticator`](crate::Authenticator), then lent by `&mut` to the zone
/// resolver and record manager. `&mut` keeps every exchange single-flight,
/// which the token handling below depends on.
pub struct Session {
    transport: Box<dyn PortalTransport>,
    state: AuthState,
    /// Anti-forgery token of the most recent page, consumed by the next form submission.
    anti_forgery_token: Option<String>,
    zones: Option<Vec<Zone>>,
}

impl Session {
    pub fn new(transport: Box<dyn PortalTransport>) -> Self {
        Self {
            transport,
            state: AuthState::Unauthenticated,
            anti_forgery_token: None,
            zones: None,
        }
    }

    /// Session over the live portal at `config.base_url`.
    pub fn connect(config: &ChallengeConfig) -> Result<Self> {
        Ok(Self::new(Box::new(ReqwestTransport::new(config)?)))
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    pub(crate) fn set_state(&mut self, state: AuthState) {
        if self.state != state {
            log::debug!("[gratisdns] Session state {:?} -> {state:?}", self.state);
            self.state = state;
        }
    }

    /// Hand out the token of the last page. It is cleared so it can never be
    /// submitted twice.
    pub(crate) fn take_token(&mut self) -> Option<String> {
        self.anti_forgery_token.take()
    }

    pub(crate) fn cached_zones(&self) -> Option<&[Zone]> {
        self.zones.as_deref()
    }

    pub(crate) fn cache_zones(&mut self, zones: Vec<Zone>) {
        self.zones = Some(zones);
    }

    /// Send a request regardless of login state.
    ///
    /// Fails with [`ChallengeError::Transport`] on a status outside 2xx/3xx
    /// and with [`ChallengeError::MarkupChanged`] when the portal answers with
    /// something other than a page. Remembers the anti-forgery token of the returned page, replacing any
    /// earlier one.
    pub async fn request(&mut self, request: PortalRequest) -> Result<PortalResponse> {
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            log::warn!(
                "[gratisdns] {} returned HTTP {}",
                request.describe(),
                response.status
            );
            return Err(ChallengeError::Transport {
                status: Some(response.status),
                detail: format!("HTTP {} for {}", response.status, request.describe()),
            });
        }

        if !response.is_html() {
            return Err(ChallengeError::markup(format!(
                "expected an HTML page for {}, got '{}'",
                request.describe(),
                response.header("content-type").unwrap_or_default()
            )));
        }

        self.anti_forgery_token = markup::anti_forgery_token(&response.body);
        Ok(response)
    }

    /// Send a request that needs a live login.
    ///
    /// A login form in the response means the portal dropped the session; the
    /// session is marked [`AuthState::Expired`] and the call fails with
    /// [`ChallengeError::SessionExpired`]. There is no silent re-login.
    pub async fn authenticated_request(&mut self, request: PortalRequest) -> Result<PortalResponse> {
        self.ensure_authenticated()?;

        let response = self.request(request).await?;
        if markup::is_login_form(&response.body) {
            log::warn!("[gratisdns] Portal answered with the login form, session expired");
            self.set_state(AuthState::Expired);
            self.anti_forgery_token = None;
            self.zones = None;
            return Err(ChallengeError::SessionExpired);
        }

        Ok(response)
    }

    pub(crate) fn ensure_authenticated(&self) -> Result<()> {
        match self.state {
            AuthState::Authenticated => Ok(()),
            AuthState::Expired => Err(ChallengeError::SessionExpired),
            _ => Err(ChallengeError::NotAuthenticated),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("has_token", &self.anti_forgery_token.is_some())
            .field("zones_cached", &self.zones.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}
