//! 测试辅助模块
//!
//! `FakePortal` is an in-memory stand-in for the GratisDNS portal. It renders
//! pages in the same shape as the captured fixtures, issues single-use
//! anti-forgery tokens, checks one-time codes, and keeps zone/record state
//! so create/delete round trips can be asserted.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::auth::Authenticator;
use crate::config::Credentials;
use crate::error::Result;
use crate::http_client::PortalTransport;
use crate::markup::{
    ACTION_ADD_TXT, ACTION_ADD_TXT_FORM, ACTION_DELETE_TXT, ACTION_LOGIN, ACTION_RECORDS,
    ACTION_USER_SETUP, ACTION_ZONE_LIST, FIELD_LOGIN, FIELD_OTP, FIELD_PASSWORD,
    FIELD_RECORD_ID, FIELD_RECORD_NAME, FIELD_TOKEN, FIELD_TXT_DATA, FIELD_ZONE,
    MARKER_RECORD_ADDED, MARKER_RECORD_DELETED,
};
use crate::session::Session;
use crate::totp::TotpSecret;
use crate::types::{Method, PortalRequest, PortalResponse};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "hunter2";
/// RFC 6238 test seed.
pub const OTP_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

/// A TXT record held by the fake portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRecord {
    pub id: String,
    pub zone: String,
    /// Relative name as submitted.
    pub name: String,
    pub value: String,
}

#[derive(Default)]
struct PortalState {
    otp: Option<TotpSecret>,
    /// The code field sits on the login form itself instead of a separate prompt.
    inline_otp: bool,
    otp_pending: bool,
    logged_in: bool,
    issued_token: Option<String>,
    token_seq: u64,
    zones: Vec<String>,
    records: Vec<FakeRecord>,
    next_record_id: u64,
    requests: Vec<PortalRequest>,
    fail_status: Option<u16>,
    next_content_type: Option<String>,
    reject_creates: bool,
    reject_duplicates: bool,
    reject_deletes: bool,
}

/// In-memory portal. Clones share state.
#[derive(Clone)]
pub struct FakePortal {
    state: Arc<Mutex<PortalState>>,
}

impl FakePortal {
    /// Portal for `alice`/`hunter2` with the single zone `example.com`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PortalState {
                zones: vec!["example.com".to_string()],
                next_record_id: 5000,
                ..PortalState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PortalState> {
        self.state.lock().unwrap()
    }

    pub fn with_zones(self, zones: &[&str]) -> Self {
        self.lock().zones = zones.iter().map(ToString::to_string).collect();
        self
    }

    /// Ask for a one-time code derived from `secret` on a prompt page after
    /// the password was accepted.
    pub fn with_otp(self, secret: &str) -> Self {
        self.lock().otp = Some(TotpSecret::from_base32(secret).unwrap());
        self
    }

    /// Expect the one-time code in the login form, next to the password.
    pub fn with_inline_otp(self, secret: &str) -> Self {
        {
            let mut state = self.lock();
            state.otp = Some(TotpSecret::from_base32(secret).unwrap());
            state.inline_otp = true;
        }
        self
    }

    /// Login submissions, including the one-time code step.
    pub fn login_posts(&self) -> Vec<PortalRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.get_param("action") == Some(ACTION_LOGIN))
            .cloned()
            .collect()
    }

    /// Seed a TXT record, returning its id.
    pub fn add_record(&self, zone: &str, name: &str, value: &str) -> String {
        let mut state = self.lock();
        state.insert_record(zone, name, value)
    }

    pub fn records(&self) -> Vec<FakeRecord> {
        self.lock().records.clone()
    }

    pub fn requests(&self) -> Vec<PortalRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Drop the login, as if the portal's session timed out.
    pub fn expire_session(&self) {
        self.lock().logged_in = false;
    }

    pub fn fail_next_with_status(&self, status: u16) {
        self.lock().fail_status = Some(status);
    }

    /// Label the next response with `content_type` instead of HTML.
    pub fn serve_next_as(&self, content_type: &str) {
        self.lock().next_content_type = Some(content_type.to_string());
    }

    pub fn reject_creates(&self, reject: bool) {
        self.lock().reject_creates = reject;
    }

    /// Refuse to add a record whose name and value already exist.
    pub fn reject_duplicates(&self, reject: bool) {
        self.lock().reject_duplicates = reject;
    }

    pub fn reject_deletes(&self, reject: bool) {
        self.lock().reject_deletes = reject;
    }
}

impl Default for FakePortal {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalState {
    fn insert_record(&mut self, zone: &str, name: &str, value: &str) -> String {
        self.next_record_id += 1;
        let id = self.next_record_id.to_string();
        self.records.push(FakeRecord {
            id: id.clone(),
            zone: zone.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        id
    }

    fn issue_token(&mut self) -> String {
        self.token_seq += 1;
        let token = format!("tok{:04}", self.token_seq);
        self.issued_token = Some(token.clone());
        token
    }

    /// Tokens are single-use: only the most recently issued one is accepted.
    fn consume_token(&mut self, request: &PortalRequest) -> bool {
        let submitted = request.get_param(FIELD_TOKEN);
        let valid = submitted.is_some() && submitted == self.issued_token.as_deref();
        self.issued_token = None;
        valid
    }

    fn route(&mut self, request: &PortalRequest) -> PortalResponse {
        let action = request.get_param("action");
        match (request.method, action) {
            (Method::Get, None) => {
                if self.logged_in {
                    PortalResponse::ok(self.navigation_page("<p>Velkommen</p>"))
                } else {
                    PortalResponse::ok(self.login_page(None))
                }
            }
            (Method::Post, Some(ACTION_LOGIN)) => PortalResponse::ok(self.login(request)),
            (_, Some(_)) if !self.logged_in => PortalResponse::ok(self.login_page(None)),
            (Method::Get, Some(ACTION_USER_SETUP)) => PortalResponse::ok(self.navigation_page(
                &format!("<table class=\"table\"><tr><td>Brugernavn</td><td>{USERNAME}</td></tr></table>"),
            )),
            (Method::Get, Some(ACTION_ZONE_LIST)) => PortalResponse::ok(self.zone_list_page()),
            (Method::Get, Some(ACTION_RECORDS)) => {
                let zone = request.get_param(FIELD_ZONE).unwrap_or_default().to_string();
                PortalResponse::ok(self.records_page(&zone))
            }
            (Method::Get, Some(ACTION_ADD_TXT_FORM)) => {
                let token = self.issue_token();
                PortalResponse::ok(self.navigation_page(&format!(
                    "<form method=\"post\"><input type=\"hidden\" name=\"csrf_token\" value=\"{token}\">\
                     <input type=\"text\" name=\"name\"><input type=\"text\" name=\"txtdata\"></form>"
                )))
            }
            (Method::Post, Some(ACTION_ADD_TXT)) => PortalResponse::ok(self.create(request)),
            (Method::Get, Some(ACTION_DELETE_TXT)) => PortalResponse::ok(self.delete(request)),
            _ => PortalResponse {
                status: 404,
                body: "Not Found".to_string(),
                ..PortalResponse::default()
            },
        }
    }

    fn login(&mut self, request: &PortalRequest) -> String {
        if !self.consume_token(request) {
            return self.login_page(Some("Sessionen er udløbet, prøv igen"));
        }
        if request.get_param(FIELD_LOGIN) != Some(USERNAME)
            || request.get_param(FIELD_PASSWORD) != Some(PASSWORD)
        {
            return self.login_page(Some("Forkert brugernavn eller adgangskode"));
        }

        if let Some(otp) = self.otp.clone() {
            // A two-step portal ignores the code until it has shown its prompt.
            let expects_code = self.inline_otp || self.otp_pending;
            self.otp_pending = false;
            let Some(code) = request.get_param(FIELD_OTP).filter(|_| expects_code) else {
                if self.inline_otp {
                    return self.login_page(Some("Forkert login"));
                }
                self.otp_pending = true;
                let token = self.issue_token();
                return format!(
                    "<html><body><form method=\"post\">\
                     <input type=\"hidden\" name=\"csrf_token\" value=\"{token}\">\
                     <input type=\"text\" name=\"oauth\"></form></body></html>"
                );
            };
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
            let accepted = [now, now.saturating_sub(30)]
                .iter()
                .any(|t| otp.code_at(*t) == code);
            if !accepted {
                return self.login_page(Some("Forkert kode"));
            }
        }

        self.logged_in = true;
        self.navigation_page("<p>Du er logget ind</p>")
    }

    fn create(&mut self, request: &PortalRequest) -> String {
        if !self.consume_token(request) {
            return alert("danger", "Ugyldig formular");
        }
        let zone = request.get_param(FIELD_ZONE).unwrap_or_default().to_string();
        let name = request.get_param(FIELD_RECORD_NAME).unwrap_or_default().to_string();
        let value = request.get_param(FIELD_TXT_DATA).unwrap_or_default().to_string();

        if self.reject_creates || !self.zones.contains(&zone) {
            return alert("danger", "Kunne ikke oprette record");
        }
        let duplicate = self
            .records
            .iter()
            .any(|r| r.zone == zone && r.name == name && r.value == value);
        if self.reject_duplicates && duplicate {
            return alert("danger", "Record findes allerede");
        }

        self.insert_record(&zone, &name, &value);
        alert("success", MARKER_RECORD_ADDED)
    }

    fn delete(&mut self, request: &PortalRequest) -> String {
        if !self.consume_token(request) {
            return alert("danger", "Ugyldig formular");
        }
        if self.reject_deletes {
            return alert("danger", "Record kunne ikke slettes");
        }
        let id = request.get_param(FIELD_RECORD_ID).unwrap_or_default();
        let zone = request.get_param(FIELD_ZONE).unwrap_or_default();
        let before = self.records.len();
        self.records.retain(|r| !(r.id == id && r.zone == zone));
        if self.records.len() == before {
            return alert("danger", "Record not found");
        }
        alert("success", MARKER_RECORD_DELETED)
    }

    fn login_page(&mut self, error: Option<&str>) -> String {
        let token = self.issue_token();
        let banner = error.map(|e| alert("danger", e)).unwrap_or_default();
        let code_field = if self.inline_otp {
            "<input type=\"text\" name=\"oauth\">"
        } else {
            ""
        };
        format!(
            "<html><body>{banner}<form method=\"post\" action=\"./\">\
             <input type=\"hidden\" name=\"action\" value=\"logmein\">\
             <input type=\"hidden\" name=\"csrf_token\" value=\"{token}\">\
             <input type=\"text\" name=\"login\"><input type=\"password\" name=\"password\">\
             {code_field}</form></body></html>"
        )
    }

    fn navigation_page(&self, content: &str) -> String {
        format!(
            "<html><body><nav><a href=\"./?action=dns_primarydns\">Primær DNS</a>\
             <a href=\"./?action=logout\">Log ud ({USERNAME})</a></nav>\
             <div class=\"container\">{content}</div></body></html>"
        )
    }

    fn zone_list_page(&self) -> String {
        let rows: String = self
            .zones
            .iter()
            .map(|z| {
                format!(
                    "<tr><td><a href=\"./?action=dns_primary_changeDNSsetup&amp;user_domain={z}\">{z}</a></td></tr>"
                )
            })
            .collect();
        self.navigation_page(&format!("<table>{rows}</table>"))
    }

    fn records_page(&mut self, zone: &str) -> String {
        let token = self.issue_token();
        let rows: String = self
            .records
            .iter()
            .filter(|r| r.zone == zone)
            .map(|r| {
                let host = if r.name.is_empty() {
                    r.zone.clone()
                } else {
                    format!("{}.{}", r.name, r.zone)
                };
                format!(
                    "<tr><td>{host}</td><td>{}</td><td>60</td>\
                     <td><a href=\"./?action=dns_primary_delete_txt&amp;id={}&amp;user_domain={}\">Slet</a></td></tr>",
                    r.value, r.id, r.zone
                )
            })
            .collect();
        self.navigation_page(&format!(
            "<input type=\"hidden\" name=\"csrf_token\" value=\"{token}\">\
             <table><tr><td>{zone}</td><td>192.0.2.1</td><td>3600</td>\
             <td><a href=\"./?action=dns_primary_delete_a&amp;id=1&amp;user_domain={zone}\">Slet</a></td></tr></table>\
             <h3>TXT</h3><table><tr><th>Host</th><th>Data</th><th>TTL</th><th></th></tr>{rows}</table>"
        ))
    }
}

fn alert(kind: &str, message: &str) -> String {
    format!("<div class=\"alert alert-{kind}\" role=\"alert\">{message}</div>")
}

#[async_trait]
impl PortalTransport for FakePortal {
    async fn send(&self, request: &PortalRequest) -> Result<PortalResponse> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        if let Some(status) = state.fail_status.take() {
            return Ok(PortalResponse {
                status,
                body: "Service Unavailable".to_string(),
                ..PortalResponse::default()
            });
        }
        let mut response = state.route(request);
        if let Some(content_type) = state.next_content_type.take() {
            response.headers.insert("content-type".to_string(), content_type);
        }
        Ok(response)
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD, None)
}

pub fn otp_credentials(secret: &str) -> Credentials {
    Credentials::new(USERNAME, PASSWORD, Some(secret.to_string()))
}

/// A session already logged in to `portal`.
pub async fn authenticated_session(portal: &FakePortal) -> Session {
    let mut session = Session::new(Box::new(portal.clone()));
    Authenticator::new(credentials())
        .login(&mut session)
        .await
        .unwrap();
    session
}
