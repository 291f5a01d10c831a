use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AuthError;

/// Decrypted content of a session token
///
/// Immutable once created. Every authentication event produces two payloads,
/// one access and one refresh, sharing `subject_id` and `is_admin` but never a
/// token `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Unique identifier of this token, used as the cache tracking key
    pub id: Uuid,
    /// Identity this token authenticates
    pub subject_id: Uuid,
    /// Privileged-subject flag, carried into downstream authorization
    pub is_admin: bool,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl TokenPayload {
    /// Create a payload for `subject_id` valid for `duration` from now
    ///
    /// A negative `duration` produces an already-expired payload; the codec
    /// will still seal it, and verification reports it as expired rather than
    /// invalid.
    #[must_use]
    pub fn new(subject_id: Uuid, is_admin: bool, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject_id,
            is_admin,
            issued_at: now,
            expired_at: now + duration,
        }
    }

    /// Check the payload against the clock
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ExpiredToken`] once the expiry has passed.
    pub fn check_expiry(&self) -> Result<(), AuthError> {
        if Utc::now() > self.expired_at {
            return Err(AuthError::ExpiredToken);
        }
        Ok(())
    }

    /// Remaining validity; negative once expired
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expired_at - Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_ids_are_unique() {
        let subject = Uuid::new_v4();
        let first = TokenPayload::new(subject, false, Duration::minutes(1));
        let second = TokenPayload::new(subject, false, Duration::minutes(1));

        assert_ne!(first.id, second.id);
        assert_eq!(first.subject_id, second.subject_id);
    }

    #[test]
    fn test_negative_duration_is_expired() {
        let payload = TokenPayload::new(Uuid::new_v4(), false, -Duration::minutes(1));
        assert!(matches!(
            payload.check_expiry(),
            Err(AuthError::ExpiredToken)
        ));
        assert!(payload.remaining() < Duration::zero());
    }

    #[test]
    fn test_fresh_payload_passes_expiry_check() {
        let payload = TokenPayload::new(Uuid::new_v4(), true, Duration::minutes(1));
        assert!(payload.check_expiry().is_ok());
        assert!(payload.is_admin);
    }
}
