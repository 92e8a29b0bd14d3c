//! Log sanitization utilities
//!
//! Portal pages are large and login forms carry passwords and one-time codes.
//! Nothing from a request or response reaches the log without passing
//! through here.

use crate::markup::{FIELD_LOGIN, FIELD_OTP, FIELD_PASSWORD, FIELD_TOKEN};

/// Maximum number of bytes of a page body to include in log output.
const TRUNCATE_LIMIT: usize = 256;

/// Form fields whose values are never logged.
const SECRET_FIELDS: &[&str] = &[FIELD_PASSWORD, FIELD_OTP, FIELD_TOKEN, FIELD_LOGIN];

/// MSRV-compatible replacement for `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a page body for logging.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Render request parameters as `k=v&k=v` with secret values masked.
pub fn redact_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| {
            if SECRET_FIELDS.contains(&k.as_str()) {
                format!("{k}=***")
            } else {
                format!("{k}={v}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
