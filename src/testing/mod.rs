//! Shared fixtures for unit and integration tests
//!
//! Compiled for the crate's own `#[cfg(test)]` builds and for integration
//! tests via the `testing` cargo feature. Everything here builds against the
//! in-memory cache so no test needs a Redis deployment.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::cache::InMemorySessionCache;
use crate::session::SessionManager;
use crate::settings::VaultgateSettings;
use crate::subjects::{StaticSubjectDirectory, Subject};
use crate::token::{TokenCodec, SYMMETRIC_KEY_SIZE};

/// Fixed key for tests; the right size, deliberately unremarkable
pub const TEST_SYMMETRIC_KEY: &[u8; SYMMETRIC_KEY_SIZE] = b"0123456789abcdef0123456789abcdef";

/// Low bcrypt cost keeps suites fast; never use outside tests
pub const TEST_BCRYPT_COST: u32 = 4;

/// Codec over the fixed test key
///
/// # Panics
///
/// Panics if the fixed key stops matching the cipher's key size.
#[must_use]
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(TEST_SYMMETRIC_KEY).expect("test key has the right size")
}

/// Fresh in-memory cache
#[must_use]
pub fn test_cache() -> Arc<InMemorySessionCache> {
    Arc::new(InMemorySessionCache::new())
}

/// Manager over a fresh in-memory cache with production-like durations
#[must_use]
pub fn test_manager() -> SessionManager {
    test_manager_with(test_cache())
}

/// Manager sharing the given cache, so tests can inspect tracked state
#[must_use]
pub fn test_manager_with(cache: Arc<InMemorySessionCache>) -> SessionManager {
    SessionManager::new(
        test_codec(),
        cache,
        Duration::minutes(15),
        Duration::hours(24),
    )
}

/// Settings preloaded with the fixed test key and short durations
#[must_use]
pub fn test_settings() -> VaultgateSettings {
    let mut settings = VaultgateSettings::default();
    settings.token.symmetric_key =
        String::from_utf8(TEST_SYMMETRIC_KEY.to_vec()).expect("test key is ascii");
    settings.token.access_duration_seconds = 60;
    settings.token.refresh_duration_seconds = 3600;
    settings
}

/// Directory holding a single subject with a bcrypt-hashed password
///
/// Returns the directory together with the subject's id for assertions.
///
/// # Panics
///
/// Panics if bcrypt hashing fails.
#[must_use]
pub fn seeded_directory(username: &str, password: &str, is_admin: bool) -> (StaticSubjectDirectory, Uuid) {
    let id = Uuid::new_v4();
    let directory = StaticSubjectDirectory::new(vec![Subject {
        id,
        username: username.to_string(),
        password_hash: bcrypt::hash(password, TEST_BCRYPT_COST).expect("bcrypt hash"),
        is_admin,
    }]);
    (directory, id)
}
