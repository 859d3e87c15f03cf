//! Vitality Token Service (C3): issues and verifies short-lived HMAC-signed
//! tokens that certify a module as healthy, recovering, or critical.
//!
//! The shared secret is loaded once at startup; if absent, a random secret
//! is generated and tokens will not survive a process restart.

use aec_core::Clock;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Token freshness window (`spec.md` §4.3, default 5 minutes).
pub const MAX_AGE_MILLIS: i64 = 5 * 60 * 1000;
/// Allowed forward clock skew on `issued_at` (default 60s).
pub const MAX_CLOCK_SKEW_MILLIS: i64 = 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Healthy,
    Recovering,
    Critical,
}

impl TokenStatus {
    fn as_str(self) -> &'static str {
        match self {
            TokenStatus::Healthy => "HEALTHY",
            TokenStatus::Recovering => "RECOVERING",
            TokenStatus::Critical => "CRITICAL",
        }
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "HEALTHY" => Ok(TokenStatus::Healthy),
            "RECOVERING" => Ok(TokenStatus::Recovering),
            "CRITICAL" => Ok(TokenStatus::Critical),
            _ => Err(()),
        }
    }
}

/// Rejection reasons surfaced by `verify`, also used directly as the
/// `TOKEN_FORGED` / `TOKEN_EXPIRED` / `TOKEN_MODULE_MISMATCH` event family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    ModuleIdMismatch,
    Expired,
    ClockSkew,
    Forged,
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenRejection::Malformed => "MALFORMED",
            TokenRejection::ModuleIdMismatch => "MODULE_ID_MISMATCH",
            TokenRejection::Expired => "EXPIRED",
            TokenRejection::ClockSkew => "CLOCK_SKEW",
            TokenRejection::Forged => "FORGED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub ok: bool,
    pub issued_at: Option<i64>,
    pub status: Option<TokenStatus>,
    pub reason: Option<TokenRejection>,
}

impl VerifyResult {
    fn accept(issued_at: i64, status: TokenStatus) -> Self {
        Self {
            ok: true,
            issued_at: Some(issued_at),
            status: Some(status),
            reason: None,
        }
    }

    fn reject(reason: TokenRejection) -> Self {
        Self {
            ok: false,
            issued_at: None,
            status: None,
            reason: Some(reason),
        }
    }
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("secret must not be empty")]
    EmptySecret,
}

/// Strips non-printable ASCII from an untrusted module id before it is
/// embedded in an error message (`spec.md` §4.3 step 2).
fn sanitize_for_message(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_control()).collect()
}

pub struct TokenService {
    secret: RwLock<Vec<u8>>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Build a service around an explicit secret. Empty secrets are
    /// rejected; a random secret (see `with_random_secret`) is how callers
    /// express "no secret configured".
    pub fn new(secret: Vec<u8>, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self {
            secret: RwLock::new(secret),
            clock,
        })
    }

    /// Generate a random secret when none is configured. Tokens issued this
    /// way do not survive a process restart.
    pub fn with_random_secret(random: &dyn aec_core::SecureRandom, clock: Arc<dyn Clock>) -> Self {
        tracing::warn!("no TOKEN_SECRET configured; generated a random secret for this process; tokens will not survive a restart");
        Self {
            secret: RwLock::new(random.bytes(32)),
            clock,
        }
    }

    /// Secret-rotation hook (`spec.md` §4.3). Existing unexpired tokens
    /// signed under the old secret stop verifying immediately; this service
    /// does not retain a grace-period window for the previous secret.
    pub fn rotate_secret(&self, new_secret: Vec<u8>) {
        *self.secret.write() = new_secret;
    }

    fn mac_hex(&self, module_id: &str, issued_at: i64, status: &str) -> String {
        let concat = format!("{module_id}:{issued_at}:{status}");
        let mut mac = HmacSha256::new_from_slice(&self.secret.read())
            .expect("HMAC accepts keys of any length");
        mac.update(concat.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Issue a vitality token for `module_id` at the current status.
    pub fn issue(&self, module_id: &str, status: TokenStatus) -> String {
        let issued_at = self.clock.now_millis();
        let status_str = status.as_str();
        let mac = self.mac_hex(module_id, issued_at, status_str);
        let wire = format!("{module_id}:{issued_at}:{status_str}:{mac}");
        URL_SAFE_NO_PAD.encode(wire)
    }

    /// Verify a token string, enforcing each check in the order fixed by
    /// `spec.md` §4.3.
    pub fn verify(&self, token_string: &str, expected_module_id: &str) -> VerifyResult {
        let decoded = match URL_SAFE_NO_PAD.decode(token_string) {
            Ok(d) => d,
            Err(_) => return VerifyResult::reject(TokenRejection::Malformed),
        };
        let text = match String::from_utf8(decoded) {
            Ok(t) => t,
            Err(_) => return VerifyResult::reject(TokenRejection::Malformed),
        };
        let fields: Vec<&str> = text.splitn(4, ':').collect();
        let [module_id, issued_at_str, status_str, mac_hex]: [&str; 4] = match fields.try_into() {
            Ok(f) => f,
            Err(_) => return VerifyResult::reject(TokenRejection::Malformed),
        };

        if module_id != expected_module_id {
            tracing::warn!(
                claimed_module_id = %sanitize_for_message(module_id),
                "vitality token module id mismatch"
            );
            return VerifyResult::reject(TokenRejection::ModuleIdMismatch);
        }

        let issued_at: i64 = match issued_at_str.parse() {
            Ok(v) => v,
            Err(_) => return VerifyResult::reject(TokenRejection::Malformed),
        };
        let status: TokenStatus = match status_str.parse() {
            Ok(s) => s,
            Err(_) => return VerifyResult::reject(TokenRejection::Malformed),
        };

        let now = self.clock.now_millis();
        if now - issued_at > MAX_AGE_MILLIS {
            return VerifyResult::reject(TokenRejection::Expired);
        }
        if issued_at > now + MAX_CLOCK_SKEW_MILLIS {
            return VerifyResult::reject(TokenRejection::ClockSkew);
        }

        let expected_mac = self.mac_hex(module_id, issued_at, status_str);
        let expected_bytes = expected_mac.as_bytes();
        let actual_bytes = mac_hex.as_bytes();
        let macs_equal = expected_bytes.len() == actual_bytes.len()
            && bool::from(expected_bytes.ct_eq(actual_bytes));
        if !macs_equal {
            return VerifyResult::reject(TokenRejection::Forged);
        }

        VerifyResult::accept(issued_at, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aec_core::FixedClock;

    fn service_at(millis: i64) -> (TokenService, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(millis));
        let svc = TokenService::new(b"test-secret".to_vec(), clock.clone()).unwrap();
        (svc, clock)
    }

    #[test]
    fn issue_then_verify_accepts() {
        let (svc, _clock) = service_at(1_000_000);
        let token = svc.issue("moduleA", TokenStatus::Healthy);
        let result = svc.verify(&token, "moduleA");
        assert!(result.ok);
        assert_eq!(result.status, Some(TokenStatus::Healthy));
        assert_eq!(result.issued_at, Some(1_000_000));
    }

    #[test]
    fn module_id_mismatch_rejected() {
        let (svc, _clock) = service_at(0);
        let token = svc.issue("moduleA", TokenStatus::Healthy);
        let result = svc.verify(&token, "moduleB");
        assert!(!result.ok);
        assert_eq!(result.reason, Some(TokenRejection::ModuleIdMismatch));
    }

    #[test]
    fn expired_token_rejected() {
        let (svc, clock) = service_at(0);
        let token = svc.issue("moduleA", TokenStatus::Healthy);
        clock.advance(MAX_AGE_MILLIS + 1);
        let result = svc.verify(&token, "moduleA");
        assert_eq!(result.reason, Some(TokenRejection::Expired));
    }

    #[test]
    fn token_within_freshness_window_accepted() {
        let (svc, clock) = service_at(0);
        let token = svc.issue("moduleA", TokenStatus::Healthy);
        clock.advance(MAX_AGE_MILLIS - 1);
        assert!(svc.verify(&token, "moduleA").ok);
    }

    #[test]
    fn clock_skew_beyond_tolerance_rejected() {
        let clock = Arc::new(FixedClock::new(1_000_000));
        let svc = TokenService::new(b"secret".to_vec(), clock.clone()).unwrap();
        let token = svc.issue("moduleA", TokenStatus::Healthy);
        clock.set(1_000_000 - MAX_CLOCK_SKEW_MILLIS - 1);
        let result = svc.verify(&token, "moduleA");
        assert_eq!(result.reason, Some(TokenRejection::ClockSkew));
    }

    #[test]
    fn forged_token_rejected() {
        let (svc, _clock) = service_at(0);
        let forged = URL_SAFE_NO_PAD.encode("moduleA:0:HEALTHY:deadbeef");
        let result = svc.verify(&forged, "moduleA");
        assert_eq!(result.reason, Some(TokenRejection::Forged));
    }

    #[test]
    fn malformed_token_rejected() {
        let (svc, _clock) = service_at(0);
        let result = svc.verify("not-valid-base64!!", "moduleA");
        assert_eq!(result.reason, Some(TokenRejection::Malformed));
    }

    #[test]
    fn different_secret_yields_different_mac() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(0));
        let svc_a = TokenService::new(b"secret-a".to_vec(), clock.clone()).unwrap();
        let svc_b = TokenService::new(b"secret-b".to_vec(), clock).unwrap();
        let token = svc_a.issue("moduleA", TokenStatus::Healthy);
        assert!(!svc_b.verify(&token, "moduleA").ok);
    }

    #[test]
    fn rotate_secret_invalidates_prior_tokens() {
        let (svc, _clock) = service_at(0);
        let token = svc.issue("moduleA", TokenStatus::Healthy);
        svc.rotate_secret(b"new-secret".to_vec());
        assert!(!svc.verify(&token, "moduleA").ok);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use aec_core::FixedClock;
    use proptest::prelude::*;

    fn arb_status() -> impl Strategy<Value = TokenStatus> {
        prop_oneof![
            Just(TokenStatus::Healthy),
            Just(TokenStatus::Recovering),
            Just(TokenStatus::Critical),
        ]
    }

    proptest! {
        #[test]
        fn token_authenticity(module_id in "[a-zA-Z0-9_-]{1,32}", status in arb_status(), skew_millis in 0i64..MAX_AGE_MILLIS) {
            let clock = Arc::new(FixedClock::new(0));
            let svc = TokenService::new(b"prop-secret".to_vec(), clock.clone()).unwrap();
            let token = svc.issue(&module_id, status);
            clock.advance(skew_millis);
            prop_assert!(svc.verify(&token, &module_id).ok);
        }

        #[test]
        fn forgery_resistance(module_id in "[a-zA-Z0-9_-]{1,32}", garbage in "[a-zA-Z0-9_-]{1,64}") {
            let clock = Arc::new(FixedClock::new(0));
            let svc = TokenService::new(b"prop-secret".to_vec(), clock).unwrap();
            // garbage was not produced by `issue`, so it must never verify.
            prop_assert!(!svc.verify(&garbage, &module_id).ok);
        }
    }
}
