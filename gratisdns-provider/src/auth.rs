//! Portal login: password form, optional one-time code, landing-page check

use crate::config::Credentials;
use crate::error::{ChallengeError, Result};
use crate::markup::{
    self, ACTION_LOGIN, ACTION_USER_SETUP, FIELD_LOGIN, FIELD_OTP, FIELD_PASSWORD, FIELD_TOKEN,
};
use crate::session::Session;
use crate::totp::TotpSecret;
use crate::types::{AuthState, PortalRequest};

/// Drives a [`Session`] from `Unauthenticated` to `Authenticated`.
///
/// At most one login attempt is made per authenticator. Later calls report
/// the outcome of that attempt without contacting the portal again, so a
/// rejected password can never lock the account through repeated tries.
#[derive(Debug)]
pub struct Authenticator {
    credentials: Credentials,
    attempted: bool,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            attempted: false,
        }
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Log `session` in, or report the result of the earlier attempt.
    pub async fn login(&mut self, session: &mut Session) -> Result<()> {
        if self.attempted {
            let state = session.state();
            return match state {
                AuthState::Authenticated => Ok(()),
                AuthState::Expired => Err(ChallengeError::SessionExpired),
                _ if state.is_terminal() => {
                    Err(self.rejected("login already failed earlier in this run"))
                }
                _ => Err(self.rejected("login attempt did not complete")),
            };
        }
        self.attempted = true;

        log::info!("[gratisdns] Logging in as '{}'", self.credentials.username);
        match self.run(session).await {
            Ok(()) => {
                session.set_state(AuthState::Authenticated);
                log::info!("[gratisdns] Logged in as '{}'", self.credentials.username);
                Ok(())
            }
            Err(e) => {
                session.set_state(AuthState::Rejected);
                if e.is_expected() {
                    log::warn!("[gratisdns] Login failed: {e}");
                } else {
                    log::error!("[gratisdns] Login failed: {e}");
                }
                Err(e)
            }
        }
    }

    async fn run(&self, session: &mut Session) -> Result<()> {
        // Decode before any request so a broken secret never costs a login attempt.
        let totp = self.credentials.totp()?;

        let landing = session.request(PortalRequest::get(None)).await?;
        if !markup::is_login_form(&landing.body) {
            return Err(ChallengeError::markup("login form not found on portal root"));
        }

        // The login form takes the code next to the password when the account has one.
        let token = session.take_token();
        let request = self
            .credentials_form(token.as_deref())
            .param_opt(FIELD_OTP, totp.as_ref().map(TotpSecret::current_code).as_deref());
        let response = session.request(request).await?;
        session.set_state(AuthState::CredentialsSubmitted);

        let body = response.body;
        if markup::is_login_form(&body) {
            return Err(self.rejected_with(&body, "credentials not accepted"));
        }

        if markup::requires_otp(&body) {
            session.set_state(AuthState::OtpRequired);
            let secret = totp.ok_or_else(|| ChallengeError::MissingOtpSecret {
                username: self.credentials.username.clone(),
            })?;
            let body = self.submit_otp(session, &secret).await?;
            if markup::is_login_form(&body) || markup::requires_otp(&body) {
                return Err(self.rejected_with(&body, "one-time code not accepted"));
            }
        }

        let setup = session
            .request(PortalRequest::get(Some(ACTION_USER_SETUP)))
            .await?;
        if !markup::is_authenticated_page(&setup.body, &self.credentials.username) {
            return Err(self.rejected_with(&setup.body, "account page not reachable after login"));
        }
        Ok(())
    }

    async fn submit_otp(&self, session: &mut Session, secret: &TotpSecret) -> Result<String> {
        let token = session.take_token();
        // Computed at submission time; a code from an earlier page load may have rolled over.
        let code = secret.current_code();
        let request = self
            .credentials_form(token.as_deref())
            .param(FIELD_OTP, code);
        Ok(session.request(request).await?.body)
    }

    fn credentials_form(&self, token: Option<&str>) -> PortalRequest {
        PortalRequest::post(ACTION_LOGIN)
            .param(FIELD_LOGIN, self.credentials.username.as_str())
            .param(FIELD_PASSWORD, self.credentials.password.as_str())
            .param_opt(FIELD_TOKEN, token)
    }

    fn rejected(&self, reason: &str) -> ChallengeError {
        ChallengeError::AuthenticationRejected {
            username: self.credentials.username.clone(),
            reason: reason.to_string(),
        }
    }

    fn rejected_with(&self, body: &str, fallback: &str) -> ChallengeError {
        match markup::error_message(body) {
            Some(message) => self.rejected(&format!("{fallback}: {message}")),
            None => self.rejected(fallback),
        }
    }
}
