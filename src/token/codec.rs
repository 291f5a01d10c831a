// Authenticated encryption of token payloads using AES-256-GCM

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::Duration;
use rand::RngCore;
use uuid::Uuid;

use crate::errors::AuthError;
use crate::token::payload::TokenPayload;

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Symmetric key size for AES-256 (256 bits)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Access and refresh tokens issued together for one authentication event
///
/// Construction is all-or-nothing: if sealing the refresh token fails, the
/// already-sealed access token is discarded and no pair is returned.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: TokenPayload,
    pub access_token: String,
    pub refresh: TokenPayload,
    pub refresh_token: String,
}

/// Issues and verifies opaque session tokens
///
/// The serialized form is `base64url(nonce || ciphertext)` with a fresh random
/// nonce per token. Verification has no side effects and performs no cache
/// lookups: a verified payload proves possession of a well-formed, unexpired
/// token, nothing more.
#[derive(Clone)]
pub struct TokenCodec {
    key: [u8; SYMMETRIC_KEY_SIZE],
}

impl TokenCodec {
    /// Create a codec from raw symmetric key material
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] when `key` is not exactly
    /// [`SYMMETRIC_KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, AuthError> {
        let key: [u8; SYMMETRIC_KEY_SIZE] =
            key.try_into().map_err(|_| AuthError::InvalidKey(key.len()))?;
        Ok(Self { key })
    }

    /// Issue a single token for `subject_id` valid for `duration`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if payload serialization or encryption
    /// fails.
    pub fn issue(
        &self,
        subject_id: Uuid,
        is_admin: bool,
        duration: Duration,
    ) -> Result<(TokenPayload, String), AuthError> {
        let payload = TokenPayload::new(subject_id, is_admin, duration);
        let token = self.seal(&payload)?;
        Ok((payload, token))
    }

    /// Issue a fresh access/refresh pair with independent token ids
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if sealing either token fails; in that
    /// case nothing is returned to the caller.
    pub fn issue_pair(
        &self,
        subject_id: Uuid,
        is_admin: bool,
        access_duration: Duration,
        refresh_duration: Duration,
    ) -> Result<TokenPair, AuthError> {
        let (access, access_token) = self.issue(subject_id, is_admin, access_duration)?;
        let (refresh, refresh_token) = self.issue(subject_id, is_admin, refresh_duration)?;

        Ok(TokenPair {
            access,
            access_token,
            refresh,
            refresh_token,
        })
    }

    /// Decrypt, authenticate, and freshness-check a serialized token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for anything malformed, tampered
    /// with, or sealed under a different key, and [`AuthError::ExpiredToken`]
    /// for a cryptographically valid token past its expiry.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, AuthError> {
        let combined = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AuthError::InvalidToken)?;

        if combined.len() < NONCE_SIZE {
            return Err(AuthError::InvalidToken);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload: TokenPayload =
            serde_json::from_slice(&plaintext).map_err(|_| AuthError::InvalidToken)?;

        payload.check_expiry()?;
        Ok(payload)
    }

    /// Serialize and encrypt a payload into its opaque wire form
    fn seal(&self, payload: &TokenPayload) -> Result<String, AuthError> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| AuthError::Internal(format!("failed to serialize payload: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let ciphertext = cipher
            .encrypt(nonce, json.as_slice())
            .map_err(|e| AuthError::Internal(format!("encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(&[7u8; SYMMETRIC_KEY_SIZE]).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = test_codec();
        let subject = Uuid::new_v4();

        let (payload, token) = codec.issue(subject, false, Duration::minutes(1)).unwrap();
        assert!(!token.is_empty());

        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified, payload);
        assert_eq!(verified.subject_id, subject);
    }

    #[test]
    fn test_issued_token_ids_never_repeat() {
        let codec = test_codec();
        let subject = Uuid::new_v4();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..32 {
            let (payload, _) = codec.issue(subject, false, Duration::minutes(1)).unwrap();
            assert!(seen.insert(payload.id));
        }
    }

    #[test]
    fn test_expired_token_is_expired_not_invalid() {
        let codec = test_codec();

        let (_, token) = codec
            .issue(Uuid::new_v4(), false, -Duration::minutes(1))
            .unwrap();

        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let codec = test_codec();
        let (_, token) = codec
            .issue(Uuid::new_v4(), false, Duration::minutes(1))
            .unwrap();

        let mut tampered: Vec<char> = token.chars().collect();
        let mid = tampered.len() / 2;
        tampered[mid] = if tampered[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();

        assert!(matches!(
            codec.verify(&tampered),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_key_is_invalid() {
        let codec = test_codec();
        let other = TokenCodec::new(&[9u8; SYMMETRIC_KEY_SIZE]).unwrap();

        let (_, token) = codec
            .issue(Uuid::new_v4(), false, Duration::minutes(1))
            .unwrap();

        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_input_is_invalid() {
        let codec = test_codec();
        assert!(matches!(codec.verify(""), Err(AuthError::InvalidToken)));
        assert!(matches!(
            codec.verify("not a token"),
            Err(AuthError::InvalidToken)
        ));
        // Valid base64 but shorter than a nonce
        assert!(matches!(codec.verify("AAAA"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_rejects_wrong_key_size() {
        assert!(matches!(
            TokenCodec::new(&[0u8; 16]),
            Err(AuthError::InvalidKey(16))
        ));
        assert!(matches!(
            TokenCodec::new(&[0u8; 33]),
            Err(AuthError::InvalidKey(33))
        ));
    }

    #[test]
    fn test_pair_shares_subject_but_not_ids() {
        let codec = test_codec();
        let subject = Uuid::new_v4();

        let pair = codec
            .issue_pair(subject, true, Duration::minutes(15), Duration::hours(24))
            .unwrap();

        assert_eq!(pair.access.subject_id, subject);
        assert_eq!(pair.refresh.subject_id, subject);
        assert!(pair.access.is_admin);
        assert!(pair.refresh.is_admin);
        assert_ne!(pair.access.id, pair.refresh.id);
        assert!(pair.refresh.expired_at > pair.access.expired_at);

        assert_eq!(codec.verify(&pair.access_token).unwrap(), pair.access);
        assert_eq!(codec.verify(&pair.refresh_token).unwrap(), pair.refresh);
    }
}
