use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ProfileUpdate, ProviderId, ProviderProfile, VerificationDocument};
use super::lifecycle::{plan_change, AppliedChange, EditError, TransitionError, VerificationEvent};

/// Content edit plus the verification events to run once it has landed.
///
/// Events are evaluated against the stored status at write time, never
/// against a copy the caller read earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChange {
    pub update: ProfileUpdate,
    pub events: Vec<VerificationEvent>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileChange {
    pub fn edit(update: ProfileUpdate, updated_at: DateTime<Utc>) -> Self {
        Self {
            update,
            events: Vec::new(),
            updated_at,
        }
    }

    pub fn event(event: VerificationEvent, updated_at: DateTime<Utc>) -> Self {
        Self::edit(ProfileUpdate::new(), updated_at).then(event)
    }

    pub fn then(mut self, event: VerificationEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Document store holding provider listings.
///
/// `apply` must be atomic: it folds the change onto the stored profile with
/// [`fold_change`] and writes content and verification together, or nothing.
pub trait ProfileStore: Send + Sync {
    fn insert(&self, profile: ProviderProfile) -> Result<ProviderProfile, StoreError>;
    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError>;
    fn apply(&self, id: &ProviderId, change: ProfileChange) -> Result<AppliedChange, StoreError>;
    fn pending(&self, limit: usize) -> Result<Vec<ProviderProfile>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile already exists")]
    Conflict,
    #[error("profile not found")]
    NotFound,
    #[error("profile change rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// OCR or equivalent capability turning an uploaded document into text.
pub trait DocumentTextExtractor: Send + Sync {
    fn extract_text(&self, document: &VerificationDocument) -> Result<String, ExtractionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("document `{0}` has no readable text")]
    Unreadable(String),
    #[error("text extraction unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget trail of verification decisions.
pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ProfileRegistered,
    ProfileUpdated,
    VerificationRevoked,
    DocumentScored,
    VerificationApproved,
    VerificationRejected,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProfileRegistered => "profile_registered",
            Self::ProfileUpdated => "profile_updated",
            Self::VerificationRevoked => "verification_revoked",
            Self::DocumentScored => "document_scored",
            Self::VerificationApproved => "verification_approved",
            Self::VerificationRejected => "verification_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub target: ProviderId,
    pub details: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, target: ProviderId) -> Self {
        Self {
            action,
            target,
            details: BTreeMap::new(),
            reason: None,
        }
    }

    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Transport(String),
}

/// Applies a change to the stored copy of a profile. Shared by store adapters
/// so every backend revokes sensitive edits the same way; call it while
/// holding whatever lock makes the write atomic.
pub fn fold_change(
    stored: &ProviderProfile,
    change: ProfileChange,
) -> Result<AppliedChange, StoreError> {
    plan_change(stored, &change.update, change.events, change.updated_at).map_err(|err| match err {
        EditError::Unclassified(err) => StoreError::Rejected(err.to_string()),
        EditError::Transition(err) => StoreError::Transition(err),
    })
}
