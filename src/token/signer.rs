// Session token signing and verification
//
// Tokens are `payload.timestamp.signature`, each segment base64url without
// padding. The signature is HMAC-SHA256 over the first two encoded segments,
// keyed by an HKDF-SHA256 derivation of the configured secret and salt.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation for the HKDF expansion step.
const KEY_INFO: &[u8] = b"signed-session-token";

/// Token verification failure.
///
/// `BadSignature` and `Expired` are distinguished so callers can log which
/// one occurred, even though both lead to the same "no session" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Signature does not match the payload.
    BadSignature,
    /// Signature is valid but the token is older than the allowed max age.
    Expired,
    /// Token is structurally invalid (wrong segment count, bad encoding).
    Malformed,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::BadSignature => write!(f, "token signature mismatch"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Malformed => write!(f, "token malformed"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Signs and verifies session identifiers with expiry.
///
/// Stateless apart from the derived key; safe to share across tasks.
pub struct TokenSigner {
    key: [u8; 32],
}

impl TokenSigner {
    /// Derive the signing key from the configured secret and salt.
    pub fn new(secret: &str, salt: &str) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(salt.as_bytes()), secret.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(KEY_INFO, &mut key)
            .expect("32-byte output is valid for HKDF-SHA256");
        Self { key }
    }

    /// Sign a session identifier with the current timestamp.
    pub fn mint(&self, session_id: Uuid) -> String {
        self.mint_at(session_id, Utc::now().timestamp())
    }

    fn mint_at(&self, session_id: Uuid, issued_at: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(session_id.as_bytes());
        let timestamp = URL_SAFE_NO_PAD.encode(issued_at.to_be_bytes());
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload, &timestamp));
        format!("{}.{}.{}", payload, timestamp, signature)
    }

    /// Decode and check a token, returning the session identifier it carries.
    ///
    /// The signature is checked first (constant time), then freshness. A
    /// tampered-but-old token therefore reports `BadSignature`, not
    /// `Expired`.
    pub fn verify(&self, token: &str, max_age: Duration) -> Result<Uuid, TokenError> {
        let mut segments = token.split('.');
        let (payload, timestamp, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(p), Some(t), Some(s), None) => (p, t, s),
                _ => return Err(TokenError::Malformed),
            };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC-SHA256 accepts any key length");
        mac.update(payload.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            return Err(TokenError::BadSignature);
        }

        let issued_bytes: [u8; 8] = URL_SAFE_NO_PAD
            .decode(timestamp)
            .map_err(|_| TokenError::Malformed)?
            .try_into()
            .map_err(|_| TokenError::Malformed)?;
        let issued_at = i64::from_be_bytes(issued_bytes);

        let age = Utc::now().timestamp().saturating_sub(issued_at);
        if age > max_age.num_seconds() {
            return Err(TokenError::Expired);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        Uuid::from_slice(&payload).map_err(|_| TokenError::Malformed)
    }

    fn sign(&self, payload: &str, timestamp: &str) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC-SHA256 accepts any key length");
        mac.update(payload.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.finalize().into_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", "test-salt")
    }

    #[test]
    fn test_mint_verify_round_trip() {
        let signer = signer();
        let id = Uuid::new_v4();

        let token = signer.mint(id);
        let verified = signer.verify(&token, Duration::seconds(60)).unwrap();

        assert_eq!(verified, id);
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = signer();
        let id = Uuid::new_v4();

        let issued = Utc::now().timestamp() - 120;
        let token = signer.mint_at(id, issued);

        let result = signer.verify(&token, Duration::seconds(60));
        assert_eq!(result, Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_not_bypassed_by_valid_signature() {
        // The signature over an old timestamp is perfectly valid; verification
        // must still reject the token on age.
        let signer = signer();
        let token = signer.mint_at(Uuid::new_v4(), 0);

        let result = signer.verify(&token, Duration::seconds(3600));
        assert_eq!(result, Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = signer();
        let token = signer.mint(Uuid::new_v4());

        let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut payload = URL_SAFE_NO_PAD.decode(&segments[0]).unwrap();
        payload[0] ^= 0x01;
        segments[0] = URL_SAFE_NO_PAD.encode(payload);
        let tampered = segments.join(".");

        let result = signer.verify(&tampered, Duration::seconds(60));
        assert_eq!(result, Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_timestamp_rejected() {
        let signer = signer();
        let token = signer.mint(Uuid::new_v4());

        let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut ts = URL_SAFE_NO_PAD.decode(&segments[1]).unwrap();
        ts[7] ^= 0xff;
        segments[1] = URL_SAFE_NO_PAD.encode(ts);
        let tampered = segments.join(".");

        let result = signer.verify(&tampered, Duration::seconds(60));
        assert_eq!(result, Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let signer = signer();

        for garbage in ["", "not-a-token", "a.b", "a.b.c.d", "!!!.###.$$$"] {
            let result = signer.verify(garbage, Duration::seconds(60));
            assert_eq!(result, Err(TokenError::Malformed), "input: {:?}", garbage);
        }
    }

    #[test]
    fn test_foreign_key_rejected() {
        let ours = signer();
        let theirs = TokenSigner::new("other-secret", "test-salt");

        let token = theirs.mint(Uuid::new_v4());
        let result = ours.verify(&token, Duration::seconds(60));
        assert_eq!(result, Err(TokenError::BadSignature));
    }

    #[test]
    fn test_salt_separates_domains() {
        let ours = signer();
        let theirs = TokenSigner::new("test-secret", "other-salt");

        let token = theirs.mint(Uuid::new_v4());
        let result = ours.verify(&token, Duration::seconds(60));
        assert_eq!(result, Err(TokenError::BadSignature));
    }
}
