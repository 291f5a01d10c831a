//! Distributed session cache
//!
//! Tracks which token ids are live, which are revoked, and how many login
//! attempts a client has made, all under explicit TTLs so nothing needs a
//! background sweeper. The cache is the single coordination point between
//! concurrently handled requests: multi-key writes run as one atomic
//! transaction on the backend, and the core holds no locks of its own.
//!
//! Key namespaces:
//!   - `at:{subject}:{token}` / `rt:{subject}:{token}`: live access/refresh
//!     session markers, TTL = token lifetime
//!   - `atl:{subject}` / `rtl:{subject}`: most-recent-first token id lists,
//!     trimmed to [`SESSION_INDEX_WIDTH`]
//!   - `rev:{subject}:{token}`: revocation markers written on logout,
//!     TTL = remaining token validity plus a clock-skew margin
//!   - `lrl:{identifier}`: login attempt counters per client address

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::errors::AuthError;
use crate::token::TokenPayload;

pub use memory::InMemorySessionCache;
pub use redis_store::RedisSessionCache;

/// Token ids tracked per `(class, subject)` index list.
///
/// Trimming beyond this width drops the oldest ids from tracking only; an
/// evicted token stays cryptographically valid until it expires or is
/// explicitly revoked.
pub const SESSION_INDEX_WIDTH: isize = 3;

/// Login attempts allowed per window before a client is limited
pub const LOGIN_ATTEMPT_LIMIT: i64 = 3;

/// Length of the login rate-limit window
pub const LOGIN_WINDOW_SECS: u64 = 15 * 60;

/// Extra lifetime on revocation markers to tolerate clock skew between nodes
pub const REVOCATION_MARGIN_SECS: i64 = 60;

/// Store for active/revoked token ids and login attempt counters
///
/// Implementations must guarantee that `record_session` and `revoke` apply
/// all their writes atomically: a concurrent reader never observes a session
/// record without its index entry, or a deleted record without its revocation
/// marker.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Write both session records and push both token ids onto their
    /// per-subject index lists, trimming each list to
    /// [`SESSION_INDEX_WIDTH`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPayload`] if either payload carries a nil
    /// subject or token id, or [`AuthError::Cache`] on backend failure.
    async fn record_session(
        &self,
        access: &TokenPayload,
        access_ttl: Duration,
        refresh: &TokenPayload,
        refresh_ttl: Duration,
    ) -> Result<(), AuthError>;

    /// Consume the refresh session record for `(subject_id, token_id)`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionNotFound`] when no record exists (the
    /// signal that a refresh token is stale or already used), or
    /// [`AuthError::Cache`] on backend failure.
    async fn delete_refresh_session(&self, subject_id: Uuid, token_id: Uuid)
        -> Result<(), AuthError>;

    /// Delete both session records and write revocation markers for both
    /// tokens, TTL = remaining validity + [`REVOCATION_MARGIN_SECS`]
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] on backend failure.
    async fn revoke(
        &self,
        access: &TokenPayload,
        refresh: &TokenPayload,
    ) -> Result<(), AuthError>;

    /// Whether a revocation marker exists for this payload
    ///
    /// A miss means "not revoked". A backend failure is an error, never
    /// `false`: the caller rejects the request rather than assuming.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] on backend failure.
    async fn is_revoked(&self, payload: &TokenPayload) -> Result<bool, AuthError>;

    /// Count a login attempt for `identifier` and report whether it is over
    /// the limit
    ///
    /// The counter expires [`LOGIN_WINDOW_SECS`] after the first attempt in a
    /// window; the limit trips once it exceeds [`LOGIN_ATTEMPT_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] on backend failure.
    async fn is_rate_limited(&self, identifier: &str) -> Result<bool, AuthError>;
}

pub(crate) fn access_key(subject_id: Uuid, token_id: Uuid) -> String {
    format!("at:{subject_id}:{token_id}")
}

pub(crate) fn refresh_key(subject_id: Uuid, token_id: Uuid) -> String {
    format!("rt:{subject_id}:{token_id}")
}

pub(crate) fn access_index_key(subject_id: Uuid) -> String {
    format!("atl:{subject_id}")
}

pub(crate) fn refresh_index_key(subject_id: Uuid) -> String {
    format!("rtl:{subject_id}")
}

pub(crate) fn revocation_key(subject_id: Uuid, token_id: Uuid) -> String {
    format!("rev:{subject_id}:{token_id}")
}

pub(crate) fn login_rate_key(identifier: &str) -> String {
    format!("lrl:{identifier}")
}

/// TTL in whole seconds, clamped to a minimum of 1 so a nearly-expired token
/// still gets a real expiry instead of a backend error
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
    u64::try_from(ttl.num_seconds()).unwrap_or(0).max(1)
}

pub(crate) fn expire_seconds(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let subject = Uuid::nil();
        let token = Uuid::nil();
        let nil = "00000000-0000-0000-0000-000000000000";

        assert_eq!(access_key(subject, token), format!("at:{nil}:{nil}"));
        assert_eq!(refresh_key(subject, token), format!("rt:{nil}:{nil}"));
        assert_eq!(access_index_key(subject), format!("atl:{nil}"));
        assert_eq!(refresh_index_key(subject), format!("rtl:{nil}"));
        assert_eq!(revocation_key(subject, token), format!("rev:{nil}:{nil}"));
        assert_eq!(login_rate_key("1.2.3.4"), "lrl:1.2.3.4");
    }

    #[test]
    fn test_ttl_minimum_is_one_second() {
        assert_eq!(ttl_seconds(Duration::seconds(-30)), 1);
        assert_eq!(ttl_seconds(Duration::zero()), 1);
        assert_eq!(ttl_seconds(Duration::minutes(15)), 900);
    }
}
