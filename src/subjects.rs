//! Credential verification seam
//!
//! The session core mints tokens for an already-authenticated subject; who
//! that subject is comes from a [`SubjectDirectory`]. The trait keeps the
//! real persistence layer external: a deployment backs it with its user
//! store, while [`StaticSubjectDirectory`] serves settings-declared subjects
//! for standalone use and tests. Password hashes are bcrypt.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AuthError;
use crate::settings::SubjectSettings;

/// An identity that can authenticate against this service
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Lookup of subjects by username
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    /// Find a subject by username; `None` when unknown
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] when the backing store fails.
    async fn find_subject(&self, username: &str) -> Result<Option<Subject>, AuthError>;
}

/// Directory over a fixed, settings-declared set of subjects
#[derive(Default)]
pub struct StaticSubjectDirectory {
    subjects: HashMap<String, Subject>,
}

impl StaticSubjectDirectory {
    #[must_use]
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self {
            subjects: subjects
                .into_iter()
                .map(|s| (s.username.clone(), s))
                .collect(),
        }
    }

    /// Build the directory from `[[subjects]]` settings entries
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] when an entry carries an unparseable
    /// subject id.
    pub fn from_settings(entries: &[SubjectSettings]) -> Result<Self, AuthError> {
        let mut subjects = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = Uuid::parse_str(&entry.id).map_err(|_| {
                AuthError::Internal(format!("invalid subject id in settings: {}", entry.id))
            })?;
            subjects.push(Subject {
                id,
                username: entry.username.clone(),
                password_hash: entry.password_hash.clone(),
                is_admin: entry.is_admin,
            });
        }
        Ok(Self::new(subjects))
    }
}

#[async_trait]
impl SubjectDirectory for StaticSubjectDirectory {
    async fn find_subject(&self, username: &str) -> Result<Option<Subject>, AuthError> {
        Ok(self.subjects.get(username).cloned())
    }
}

/// Check a password against a stored bcrypt hash
///
/// # Errors
///
/// Returns [`AuthError::Internal`] when the stored hash is malformed; a
/// wrong password is `Ok(false)`, not an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Internal(format!("password verification failed: {e}")))
}
