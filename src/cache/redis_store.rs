//! Redis-backed session cache
//!
//! Multi-key operations run as MULTI/EXEC transactions so a session record,
//! its index entry, and any revocation marker change together or not at all.
//! Redis serializes the transactions; this module takes no locks.

use async_trait::async_trait;
use chrono::Duration;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::cache::{
    access_index_key, access_key, expire_seconds, login_rate_key, refresh_index_key, refresh_key,
    revocation_key, ttl_seconds, SessionCache, LOGIN_ATTEMPT_LIMIT, LOGIN_WINDOW_SECS,
    REVOCATION_MARGIN_SECS, SESSION_INDEX_WIDTH,
};
use crate::errors::AuthError;
use crate::token::TokenPayload;

/// Session cache over a shared Redis deployment
///
/// Holds a [`ConnectionManager`] handle injected at bootstrap; connection
/// lifecycle belongs to the process that created it.
#[derive(Clone)]
pub struct RedisSessionCache {
    conn: ConnectionManager,
}

impl RedisSessionCache {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a client for `url` and establish a managed connection
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] when the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(url: &str) -> Result<Self, AuthError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    /// Marker lifetime for a revoked token: what is left of its validity
    /// plus a skew margin, so the marker never dies before the token does
    fn revocation_ttl(payload: &TokenPayload) -> u64 {
        ttl_seconds(payload.remaining() + Duration::seconds(REVOCATION_MARGIN_SECS))
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn record_session(
        &self,
        access: &TokenPayload,
        access_ttl: Duration,
        refresh: &TokenPayload,
        refresh_ttl: Duration,
    ) -> Result<(), AuthError> {
        if access.subject_id.is_nil()
            || access.id.is_nil()
            || refresh.subject_id.is_nil()
            || refresh.id.is_nil()
        {
            return Err(AuthError::InvalidPayload);
        }

        let mut conn = self.conn.clone();

        let at_key = access_key(access.subject_id, access.id);
        let rt_key = refresh_key(refresh.subject_id, refresh.id);
        let atl_key = access_index_key(access.subject_id);
        let rtl_key = refresh_index_key(refresh.subject_id);
        let at_secs = ttl_seconds(access_ttl);
        let rt_secs = ttl_seconds(refresh_ttl);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(&at_key, 1, at_secs)
            .ignore()
            .set_ex(&rt_key, 1, rt_secs)
            .ignore()
            .lpush(&atl_key, access.id.to_string())
            .ignore()
            .expire(&atl_key, expire_seconds(at_secs))
            .ignore()
            .lpush(&rtl_key, refresh.id.to_string())
            .ignore()
            .expire(&rtl_key, expire_seconds(rt_secs))
            .ignore()
            // keep only the newest tracked ids per class
            .ltrim(&atl_key, 0, SESSION_INDEX_WIDTH - 1)
            .ignore()
            .ltrim(&rtl_key, 0, SESSION_INDEX_WIDTH - 1)
            .ignore();

        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete_refresh_session(
        &self,
        subject_id: Uuid,
        token_id: Uuid,
    ) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let key = refresh_key(subject_id, token_id);

        let deleted = conn.del::<_, i64>(&key).await?;
        if deleted < 1 {
            return Err(AuthError::SessionNotFound);
        }
        Ok(())
    }

    async fn revoke(
        &self,
        access: &TokenPayload,
        refresh: &TokenPayload,
    ) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();

        let session_keys = vec![
            access_key(access.subject_id, access.id),
            refresh_key(refresh.subject_id, refresh.id),
        ];
        let rev_at_key = revocation_key(access.subject_id, access.id);
        let rev_rt_key = revocation_key(refresh.subject_id, refresh.id);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(session_keys)
            .ignore()
            .set_ex(&rev_at_key, 1, Self::revocation_ttl(access))
            .ignore()
            .set_ex(&rev_rt_key, 1, Self::revocation_ttl(refresh))
            .ignore();

        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn is_revoked(&self, payload: &TokenPayload) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let key = revocation_key(payload.subject_id, payload.id);

        let marker = conn.get::<_, Option<String>>(&key).await?;
        Ok(marker.is_some())
    }

    async fn is_rate_limited(&self, identifier: &str) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let key = login_rate_key(identifier);

        let attempts = conn.incr::<_, _, i64>(&key, 1).await?;
        if attempts == 1 {
            conn.expire::<_, ()>(&key, expire_seconds(LOGIN_WINDOW_SECS))
                .await?;
        }
        Ok(attempts > LOGIN_ATTEMPT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_ttl_keeps_skew_margin() {
        let payload = TokenPayload::new(Uuid::new_v4(), false, Duration::minutes(10));
        let ttl = RedisSessionCache::revocation_ttl(&payload);

        // ten minutes of validity plus the sixty second margin, give or take
        // the test's own runtime
        assert!(ttl > 600 + 50 && ttl <= 600 + 60);
    }

    #[test]
    fn test_revocation_ttl_for_expired_token_is_minimal() {
        let payload = TokenPayload::new(Uuid::new_v4(), false, -Duration::hours(1));
        // far past expiry: margin cannot resurrect it beyond the clamp
        assert_eq!(RedisSessionCache::revocation_ttl(&payload), 1);
    }
}
