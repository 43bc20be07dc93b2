//! Provider verification and trust state.
//!
//! A profile edit is classified field by field against a static sensitivity
//! table; a sensitive edit to a verified listing revokes its badge in the same
//! store write. Uploaded registration documents are scored against the
//! identity the profile claims and feed the same status lifecycle.

pub mod domain;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod sensitivity;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    FieldSensitivity, ProfileField, ProfileUpdate, ProfileView, ProviderId, ProviderProfile,
    Revocation, UnclassifiedField, VerificationDocument, VerificationState, VerificationStatus,
};
pub use lifecycle::{
    plan_change, plan_edit, AppliedChange, EditError, Transition, TransitionError,
    VerificationEvent,
};
pub use repository::{
    fold_change, AuditAction, AuditEntry, AuditError, AuditLog, DocumentTextExtractor,
    ExtractionError, ProfileChange, ProfileStore, StoreError,
};
pub use router::provider_router;
pub use scoring::{FieldMatch, ScoringConfig, VerificationResult, VerificationScorer};
pub use service::{
    expected_values, DocumentOutcome, EditOutcome, ProviderVerificationService,
    VerificationServiceError, VerificationSettings,
};
