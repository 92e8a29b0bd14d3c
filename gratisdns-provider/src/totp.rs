//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 30 s step, 6 digits)

use chrono::Utc;
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{ChallengeError, Result};

type HmacSha1 = Hmac<Sha1>;

const TIME_STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;

/// A decoded TOTP shared secret.
#[derive(Clone)]
pub struct TotpSecret {
    key: Vec<u8>,
}

impl TotpSecret {
    /// Decode a base32 secret as shown by authenticator enrolment screens.
    ///
    /// Case, embedded spaces/dashes and `=` padding are tolerated.
    pub fn from_base32(encoded: &str) -> Result<Self> {
        let cleaned: String = encoded
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.is_empty() {
            return Err(ChallengeError::InvalidOtpSecret {
                detail: "secret is empty".to_string(),
            });
        }

        let key = BASE32_NOPAD
            .decode(cleaned.as_bytes())
            .map_err(|e| ChallengeError::InvalidOtpSecret {
                detail: e.to_string(),
            })?;

        Ok(Self { key })
    }

    /// Code valid at `unix_time`.
    pub fn code_at(&self, unix_time: u64) -> String {
        let counter = unix_time / TIME_STEP_SECS;
        #[allow(clippy::expect_used)]
        let mut mac = HmacSha1::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // RFC 4226 §5.3 dynamic truncation
        let offset = usize::from(digest[digest.len() - 1] & 0x0f);
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);

        let code = binary % 10_u32.pow(DIGITS);
        format!("{code:06}")
    }

    /// Code valid right now. Never cache the result: it expires with the
    /// current 30-second window.
    pub fn current_code(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        self.code_at(now)
    }
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TotpSecret(..)")
    }
}
