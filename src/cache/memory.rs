//! Process-local session cache
//!
//! Mirrors the Redis key semantics against in-process maps: same key shapes,
//! same TTL behavior, same index trimming. Backs the unit and integration
//! suites so session flows are testable without a cache deployment, and can
//! simulate an outage for exercising the fail-closed policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::cache::{
    access_index_key, access_key, login_rate_key, refresh_index_key, refresh_key, revocation_key,
    ttl_seconds, SessionCache, LOGIN_ATTEMPT_LIMIT, LOGIN_WINDOW_SECS, REVOCATION_MARGIN_SECS,
    SESSION_INDEX_WIDTH,
};
use crate::errors::AuthError;
use crate::token::TokenPayload;

#[derive(Default)]
struct Inner {
    /// Presence markers (`at:`/`rt:`/`rev:` keys) with their expiry deadline
    markers: HashMap<String, Instant>,
    /// Most-recent-first token id lists (`atl:`/`rtl:` keys)
    indexes: HashMap<String, Vec<String>>,
    /// Login attempt counters: count and window deadline
    windows: HashMap<String, (i64, Instant)>,
}

impl Inner {
    fn marker_live(&self, key: &str) -> bool {
        self.markers
            .get(key)
            .is_some_and(|expiry| Instant::now() < *expiry)
    }
}

/// In-memory [`SessionCache`] implementation
pub struct InMemorySessionCache {
    inner: Mutex<Inner>,
    login_window: StdDuration,
    offline: AtomicBool,
}

impl Default for InMemorySessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            login_window: StdDuration::from_secs(LOGIN_WINDOW_SECS),
            offline: AtomicBool::new(false),
        }
    }

    /// Shrink the login rate-limit window so tests can watch it elapse
    #[must_use]
    pub fn with_login_window(mut self, window: StdDuration) -> Self {
        self.login_window = window;
        self
    }

    /// Simulate backend unavailability: while set, every operation fails
    /// with a cache error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Token ids currently tracked in the access index for `subject_id`,
    /// newest first
    #[must_use]
    pub fn tracked_access_ids(&self, subject_id: Uuid) -> Vec<String> {
        self.tracked(&access_index_key(subject_id))
    }

    /// Token ids currently tracked in the refresh index for `subject_id`,
    /// newest first
    #[must_use]
    pub fn tracked_refresh_ids(&self, subject_id: Uuid) -> Vec<String> {
        self.tracked(&refresh_index_key(subject_id))
    }

    fn tracked(&self, index_key: &str) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.indexes.get(index_key).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, AuthError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Cache("cache offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| AuthError::Cache("poisoned cache lock".into()))
    }

    fn deadline(ttl: Duration) -> Instant {
        Instant::now() + StdDuration::from_secs(ttl_seconds(ttl))
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
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

        let mut inner = self.lock()?;
        let width = SESSION_INDEX_WIDTH.unsigned_abs();

        inner.markers.insert(
            access_key(access.subject_id, access.id),
            Self::deadline(access_ttl),
        );
        inner.markers.insert(
            refresh_key(refresh.subject_id, refresh.id),
            Self::deadline(refresh_ttl),
        );

        let atl = inner
            .indexes
            .entry(access_index_key(access.subject_id))
            .or_default();
        atl.insert(0, access.id.to_string());
        atl.truncate(width);

        let rtl = inner
            .indexes
            .entry(refresh_index_key(refresh.subject_id))
            .or_default();
        rtl.insert(0, refresh.id.to_string());
        rtl.truncate(width);

        Ok(())
    }

    async fn delete_refresh_session(
        &self,
        subject_id: Uuid,
        token_id: Uuid,
    ) -> Result<(), AuthError> {
        let mut inner = self.lock()?;
        let key = refresh_key(subject_id, token_id);

        if !inner.marker_live(&key) {
            return Err(AuthError::SessionNotFound);
        }
        inner.markers.remove(&key);
        Ok(())
    }

    async fn revoke(
        &self,
        access: &TokenPayload,
        refresh: &TokenPayload,
    ) -> Result<(), AuthError> {
        let mut inner = self.lock()?;
        let margin = Duration::seconds(REVOCATION_MARGIN_SECS);

        inner.markers.remove(&access_key(access.subject_id, access.id));
        inner
            .markers
            .remove(&refresh_key(refresh.subject_id, refresh.id));

        inner.markers.insert(
            revocation_key(access.subject_id, access.id),
            Self::deadline(access.remaining() + margin),
        );
        inner.markers.insert(
            revocation_key(refresh.subject_id, refresh.id),
            Self::deadline(refresh.remaining() + margin),
        );

        Ok(())
    }

    async fn is_revoked(&self, payload: &TokenPayload) -> Result<bool, AuthError> {
        let inner = self.lock()?;
        Ok(inner.marker_live(&revocation_key(payload.subject_id, payload.id)))
    }

    async fn is_rate_limited(&self, identifier: &str) -> Result<bool, AuthError> {
        let mut inner = self.lock()?;
        let key = login_rate_key(identifier);
        let now = Instant::now();
        let window = self.login_window;

        let attempts = match inner.windows.get(&key).copied() {
            Some((count, deadline)) if now < deadline => {
                inner.windows.insert(key, (count + 1, deadline));
                count + 1
            }
            _ => {
                inner.windows.insert(key, (1, now + window));
                1
            }
        };

        Ok(attempts > LOGIN_ATTEMPT_LIMIT)
    }
}
