use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::cache::SessionCache;
use crate::errors::AuthError;
use crate::settings::VaultgateSettings;
use crate::token::{TokenCodec, TokenPair, TokenPayload};

/// Orchestrates token issuance and cache state as atomic session flows
///
/// Holds the codec and an injected cache handle; connection lifecycle is
/// owned by the process bootstrap. Cloning is cheap and every clone shares
/// the same cache.
#[derive(Clone)]
pub struct SessionManager {
    codec: TokenCodec,
    cache: Arc<dyn SessionCache>,
    access_duration: Duration,
    refresh_duration: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        codec: TokenCodec,
        cache: Arc<dyn SessionCache>,
        access_duration: Duration,
        refresh_duration: Duration,
    ) -> Self {
        Self {
            codec,
            cache,
            access_duration,
            refresh_duration,
        }
    }

    /// Build a manager from loaded settings and an injected cache handle
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] when the configured symmetric key
    /// has the wrong size for the cipher.
    pub fn from_settings(
        settings: &VaultgateSettings,
        cache: Arc<dyn SessionCache>,
    ) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(settings.token.symmetric_key.as_bytes())?;
        Ok(Self::new(
            codec,
            cache,
            settings.access_duration(),
            settings.refresh_duration(),
        ))
    }

    /// The codec, for verification steps that need no cache round-trip
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue and record a fresh session for an already-authenticated subject
    ///
    /// Credential verification happens before this call; `login` only mints
    /// tokens and records them. If recording fails the freshly minted tokens
    /// are dropped and the error surfaces; no caller can observe a
    /// half-issued session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if token sealing fails, or any cache
    /// error from recording the session.
    pub async fn login(&self, subject_id: Uuid, is_admin: bool) -> Result<TokenPair, AuthError> {
        let pair = self.codec.issue_pair(
            subject_id,
            is_admin,
            self.access_duration,
            self.refresh_duration,
        )?;

        self.cache
            .record_session(
                &pair.access,
                self.access_duration,
                &pair.refresh,
                self.refresh_duration,
            )
            .await?;

        log::debug!("session recorded for subject {subject_id}");
        Ok(pair)
    }

    /// Rotate a refresh token into a new access/refresh pair
    ///
    /// The presented token must verify, must not be revoked, and its session
    /// record must still exist. Consuming the record enforces single use: a
    /// replayed refresh token finds no record and fails. Any failure along
    /// the chain aborts before new tokens are issued.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] / [`AuthError::ExpiredToken`] from
    /// verification, [`AuthError::RevokedToken`] for a signed-out token,
    /// [`AuthError::SessionNotFound`] for a stale or already-used token, or
    /// any cache error.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let old = self.codec.verify(refresh_token)?;

        if self.cache.is_revoked(&old).await? {
            return Err(AuthError::RevokedToken);
        }

        self.cache
            .delete_refresh_session(old.subject_id, old.id)
            .await?;

        let pair = self.codec.issue_pair(
            old.subject_id,
            old.is_admin,
            self.access_duration,
            self.refresh_duration,
        )?;

        self.cache
            .record_session(
                &pair.access,
                self.access_duration,
                &pair.refresh,
                self.refresh_duration,
            )
            .await?;

        log::debug!("session rotated for subject {}", old.subject_id);
        Ok(pair)
    }

    /// Revoke both tokens of a session for the remainder of their lifetime
    ///
    /// The tokens stay cryptographically valid; the revocation markers are
    /// what future [`Self::authorize`] calls consult.
    ///
    /// # Errors
    ///
    /// Returns a verification error if either token is malformed or expired,
    /// or a cache error from writing the revocation.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let access = self.codec.verify(access_token)?;
        let refresh = self.codec.verify(refresh_token)?;

        self.cache.revoke(&access, &refresh).await?;

        log::debug!("session revoked for subject {}", access.subject_id);
        Ok(())
    }

    /// Check a verified payload against the revocation list
    ///
    /// Fail-closed by policy: a cache error propagates as an error and the
    /// request is rejected; it is never treated as "not revoked".
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RevokedToken`] for a revoked payload or
    /// [`AuthError::Cache`] when the answer cannot be confirmed.
    pub async fn authorize(&self, payload: &TokenPayload) -> Result<(), AuthError> {
        if self.cache.is_revoked(payload).await? {
            return Err(AuthError::RevokedToken);
        }
        Ok(())
    }

    /// Count a login attempt for `identifier` and reject once over the limit
    ///
    /// Fail-closed like [`Self::authorize`]: a cache error rejects the
    /// attempt rather than letting it through.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RateLimited`] once the window limit is exceeded
    /// or [`AuthError::Cache`] when the counter cannot be read.
    pub async fn check_login_rate(&self, identifier: &str) -> Result<(), AuthError> {
        if self.cache.is_rate_limited(identifier).await? {
            return Err(AuthError::RateLimited);
        }
        Ok(())
    }
}
