//! GratisDNS portal adapter
//!
//! GratisDNS has no API; everything here is scraped from server-rendered
//! pages. This module is the only place that knows about action names, form
//! field names, confirmation texts, and page structure. When the portal
//! changes its markup, this is the file to update.
//!
//! Every extractor is a pure `&str -> value` function so it can be tested
//! against captured pages (see `tests/fixtures/`).

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{TxtRecord, Zone};

pub const GRATISDNS_BASE_URL: &str = "https://admin.gratisdns.com";

// ============ Actions ============

pub const ACTION_LOGIN: &str = "logmein";
pub const ACTION_USER_SETUP: &str = "usersetup_user";
pub const ACTION_ZONE_LIST: &str = "dns_primarydns";
pub const ACTION_RECORDS: &str = "dns_primary_changeDNSsetup";
pub const ACTION_ADD_TXT_FORM: &str = "dns_primary_record_add_txt";
pub const ACTION_ADD_TXT: &str = "dns_primary_record_added_txt";
pub const ACTION_DELETE_TXT: &str = "dns_primary_delete_txt";

// ============ Form fields ============

pub const FIELD_LOGIN: &str = "login";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_OTP: &str = "oauth";
pub const FIELD_TOKEN: &str = "csrf_token";
pub const FIELD_ZONE: &str = "user_domain";
pub const FIELD_RECORD_NAME: &str = "name";
pub const FIELD_TTL: &str = "ttl";
pub const FIELD_TXT_DATA: &str = "txtdata";
pub const FIELD_RECORD_ID: &str = "id";

// ============ Confirmation texts ============

pub const MARKER_RECORD_ADDED: &str = "Record was added";
pub const MARKER_RECORD_DELETED: &str = "Record was deleted";

// ============ Patterns ============

#[allow(clippy::expect_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static portal pattern must compile")
}

static INPUT_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)<input\b[^>]*>"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"(?is)([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)
});
static LOGOUT_LINK: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)action=logout\b"));
static ERROR_ALERT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"(?is)<div\b[^>]*class="[^"]*alert-danger[^"]*"[^>]*>(.*?)</div>"#)
});
static ZONE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)action=dns_primary_changeDNSsetup(?:&amp;|&)user_domain=([a-z0-9._-]+)")
});
static DELETE_TXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)action=dns_primary_delete_txt(?:&amp;|&)id=([0-9]+)"));
static TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)<tr\b[^>]*>(.*?)</tr>"));
static TABLE_CELL: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)<td\b[^>]*>(.*?)</td>"));
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)<[^>]*>"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\s+"));

// ============ Generic extraction ============

/// First capture group of `pattern` in `body`, with HTML entities decoded.
pub fn extract_token(body: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_html(m.as_str()))
}

/// Value of the `<input>` whose `name` attribute is `name`.
///
/// Attribute order and quoting style do not matter. An input without a
/// `value` attribute yields an empty string.
pub fn input_value(body: &str, name: &str) -> Option<String> {
    INPUT_TAG.find_iter(body).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        let is_match = attrs
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("name") && v == name);
        is_match.then(|| {
            attrs
                .into_iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("value"))
                .map(|(_, v)| v)
                .unwrap_or_default()
        })
    })
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((key, unescape_html(value)))
        })
        .collect()
}

/// The page's anti-forgery token, if it carries one.
pub fn anti_forgery_token(body: &str) -> Option<String> {
    input_value(body, FIELD_TOKEN).filter(|t| !t.is_empty())
}

/// Visible text of an HTML fragment: tags dropped, entities decoded,
/// whitespace collapsed.
pub fn text_content(fragment: &str) -> String {
    let without_tags = ANY_TAG.replace_all(fragment, " ");
    let decoded = unescape_html(&without_tags);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

// ============ Login pages ============

/// The page renders the username/password form.
pub fn is_login_form(body: &str) -> bool {
    input_value(body, FIELD_PASSWORD).is_some()
}

/// The page asks for a one-time code on its own.
///
/// The login form may carry the code field next to the password; that is
/// still the login form, not a prompt.
pub fn requires_otp(body: &str) -> bool {
    input_value(body, FIELD_OTP).is_some() && !is_login_form(body)
}

/// The page is only reachable with a live session for `username`: it has the
/// logout link and shows the account name.
pub fn is_authenticated_page(body: &str, username: &str) -> bool {
    LOGOUT_LINK.is_match(body)
        && !is_login_form(body)
        && body.to_lowercase().contains(&username.to_lowercase())
}

/// Error banner shown by the portal, if any.
pub fn error_message(body: &str) -> Option<String> {
    extract_token(body, &ERROR_ALERT)
        .map(|m| text_content(&m))
        .filter(|m| !m.is_empty())
}

// ============ Zones ============

/// Zones listed on the primary-DNS page, in page order without duplicates.
pub fn parse_zones(body: &str) -> Vec<Zone> {
    let mut zones: Vec<Zone> = Vec::new();
    for caps in ZONE_LINK.captures_iter(body) {
        let id = caps[1].to_string();
        let apex = normalize_name(&id);
        if !zones.iter().any(|z| z.apex == apex) {
            zones.push(Zone { id, apex });
        }
    }
    zones
}

// ============ Records ============

/// TXT rows of a zone's records page.
///
/// A TXT row is a table row carrying a TXT delete link; its first cell is the
/// host and the second the record data.
pub fn parse_txt_records(body: &str) -> Vec<TxtRecord> {
    TABLE_ROW
        .captures_iter(body)
        .filter_map(|row| {
            let row = row.get(1)?.as_str();
            let id = DELETE_TXT_LINK.captures(row)?.get(1)?.as_str().to_string();
            let mut cells = TABLE_CELL
                .captures_iter(row)
                .filter_map(|c| c.get(1).map(|m| m.as_str()));
            let name = text_content(cells.next()?);
            let value = cell_data(cells.next()?);
            Some(TxtRecord {
                id,
                name,
                value: strip_quotes(&value).to_string(),
            })
        })
        .collect()
}

/// Record data of a cell: tags dropped and entities decoded, inner
/// whitespace kept as stored.
fn cell_data(fragment: &str) -> String {
    let without_tags = ANY_TAG.replace_all(fragment, "");
    unescape_html(&without_tags).trim().to_string()
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

pub fn record_added(body: &str) -> bool {
    body.contains(MARKER_RECORD_ADDED)
}

pub fn record_deleted(body: &str) -> bool {
    body.contains(MARKER_RECORD_DELETED)
}

// ============ Names ============

/// Lower-case, without trailing dot.
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
