use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::domain::{
    ProfileField, ProfileUpdate, ProviderId, ProviderProfile, Revocation, UnclassifiedField,
    VerificationDocument, VerificationState, VerificationStatus,
};
use super::lifecycle::{AppliedChange, TransitionError, VerificationEvent};
use super::repository::{
    AuditAction, AuditEntry, AuditLog, DocumentTextExtractor, ProfileChange, ProfileStore,
    StoreError,
};
use super::scoring::{ScoringConfig, VerificationResult, VerificationScorer};
use super::sensitivity;

/// Fields of a profile that an uploaded registration document must attest.
pub const ATTESTED_FIELDS: [ProfileField; 5] = [
    ProfileField::Name,
    ProfileField::LegalName,
    ProfileField::RegistrationNumber,
    ProfileField::RegistrationAuthority,
    ProfileField::LegalRepresentative,
];

const AUTO_REVIEWER: &str = "document-scorer";

/// Policy knobs for the verification workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSettings {
    pub scoring: ScoringConfig,
    /// Approve automatically when a document passes scoring instead of
    /// queueing it for manual review.
    #[serde(default)]
    pub auto_approve: bool,
}

/// Result of a profile edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub profile: ProviderProfile,
    pub sensitive_fields: Vec<ProfileField>,
    pub revoked: bool,
}

/// Result of a document submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub profile: ProviderProfile,
    pub result: VerificationResult,
}

/// Service composing the sensitivity table, scorer, lifecycle and collaborators.
pub struct ProviderVerificationService<S, X, A> {
    store: Arc<S>,
    extractor: Arc<X>,
    audit: Arc<A>,
    scorer: Arc<VerificationScorer>,
    auto_approve: bool,
}

static PROVIDER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_provider_id() -> ProviderId {
    let id = PROVIDER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ProviderId(format!("prov-{id:06}"))
}

impl<S, X, A> ProviderVerificationService<S, X, A>
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    pub fn new(
        store: Arc<S>,
        extractor: Arc<X>,
        audit: Arc<A>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            audit,
            scorer: Arc::new(VerificationScorer::new(settings.scoring)),
            auto_approve: settings.auto_approve,
        }
    }

    pub fn scorer(&self) -> &VerificationScorer {
        &self.scorer
    }

    /// Create a listing in `pending` status.
    pub fn register(
        &self,
        fields: ProfileUpdate,
    ) -> Result<ProviderProfile, VerificationServiceError> {
        let fields = sensitivity::parse_update(&fields)?
            .into_iter()
            .collect::<BTreeMap<_, _>>();
        let now = Utc::now();

        let profile = ProviderProfile {
            id: next_provider_id(),
            fields,
            verification: VerificationState::pending(),
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert(profile)?;
        info!(provider = %stored.id, "provider registered");
        self.audit(AuditEntry::new(AuditAction::ProfileRegistered, stored.id.clone()));
        Ok(stored)
    }

    /// Apply a content edit. Sensitive edits to a verified listing revoke the
    /// badge in the same store write as the content change, judged against
    /// the status stored at write time.
    pub fn update_profile(
        &self,
        id: &ProviderId,
        update: ProfileUpdate,
    ) -> Result<EditOutcome, VerificationServiceError> {
        sensitivity::classify_update(&update)?;

        let applied = self
            .store
            .apply(id, ProfileChange::edit(update, Utc::now()))
            .map_err(|err| {
                warn!(provider = %id, error = %err, "profile edit not applied");
                err
            })?;
        self.log_changes(id, "content_edited", &applied);

        let revoked = applied.revoked();
        let profile = applied.profile;
        if revoked {
            let reason = profile
                .verification
                .revocation
                .as_ref()
                .map(Revocation::reason)
                .unwrap_or_default();
            info!(provider = %id, %reason, "verification revoked after sensitive edit");
            self.audit(
                AuditEntry::new(AuditAction::VerificationRevoked, id.clone())
                    .detail("previous_status", VerificationStatus::Verified.label())
                    .reason(reason),
            );
        } else {
            self.audit(
                AuditEntry::new(AuditAction::ProfileUpdated, id.clone())
                    .detail("status", profile.status().label()),
            );
        }

        Ok(EditOutcome {
            profile,
            sensitive_fields: applied.sensitive_fields,
            revoked,
        })
    }

    /// Score an uploaded document against the identity the profile claims and
    /// put the profile back in the review queue.
    pub fn submit_document(
        &self,
        id: &ProviderId,
        document: VerificationDocument,
    ) -> Result<DocumentOutcome, VerificationServiceError> {
        let current = self.fetch_existing(id)?;
        if current.status() == VerificationStatus::Verified {
            return Err(TransitionError::AlreadyVerified.into());
        }

        let expected = expected_values(&current);
        let raw_text = self.extractor.extract_text(&document).unwrap_or_else(|err| {
            warn!(
                provider = %id,
                document = %document.name,
                error = %err,
                "text extraction failed"
            );
            String::new()
        });
        let result = self.scorer.verify(&raw_text, &expected);

        let update = ProfileUpdate::new().with(
            ProfileField::VerificationDocuments.key(),
            documents_with(&current, &document),
        );
        let resubmitted = VerificationEvent::Resubmitted {
            result: result.clone(),
        };
        let mut change = ProfileChange::edit(update, Utc::now()).then(resubmitted);
        let auto_approved = self.auto_approve && result.success;
        if auto_approved {
            change = change.then(VerificationEvent::Approve {
                reviewer: AUTO_REVIEWER.to_string(),
            });
        }

        let applied = self.store.apply(id, change)?;
        self.log_changes(id, "document_submitted", &applied);

        let missing = result
            .missing_mandatory(self.scorer.config())
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            provider = %id,
            score = result.overall_score,
            success = result.success,
            elapsed_ms = result.processing_time_ms,
            "verification document scored"
        );
        let mut entry = AuditEntry::new(AuditAction::DocumentScored, id.clone())
            .detail("document", document.name.clone())
            .detail("overall_score", format!("{:.3}", result.overall_score))
            .detail("success", result.success.to_string());
        if !missing.is_empty() {
            entry = entry.detail("missing_mandatory", missing);
        }
        self.audit(entry);

        if auto_approved {
            self.audit(
                AuditEntry::new(AuditAction::VerificationApproved, id.clone())
                    .detail("reviewer", AUTO_REVIEWER),
            );
        }

        Ok(DocumentOutcome {
            profile: applied.profile,
            result,
        })
    }

    /// Manual approval by an administrator.
    pub fn approve(
        &self,
        id: &ProviderId,
        reviewer: &str,
    ) -> Result<ProviderProfile, VerificationServiceError> {
        let profile = self.transition(
            id,
            VerificationEvent::Approve {
                reviewer: reviewer.to_string(),
            },
        )?;
        self.audit(
            AuditEntry::new(AuditAction::VerificationApproved, id.clone())
                .detail("reviewer", reviewer),
        );
        Ok(profile)
    }

    /// Manual rejection by an administrator.
    pub fn reject(
        &self,
        id: &ProviderId,
        reason: &str,
    ) -> Result<ProviderProfile, VerificationServiceError> {
        let profile = self.transition(
            id,
            VerificationEvent::Reject {
                reason: reason.to_string(),
            },
        )?;
        self.audit(AuditEntry::new(AuditAction::VerificationRejected, id.clone()).reason(reason));
        Ok(profile)
    }

    pub fn get(&self, id: &ProviderId) -> Result<ProviderProfile, VerificationServiceError> {
        self.fetch_existing(id)
    }

    /// Profiles waiting on an administrator decision.
    pub fn review_queue(
        &self,
        limit: usize,
    ) -> Result<Vec<ProviderProfile>, VerificationServiceError> {
        Ok(self.store.pending(limit)?)
    }

    fn transition(
        &self,
        id: &ProviderId,
        event: VerificationEvent,
    ) -> Result<ProviderProfile, VerificationServiceError> {
        let label = event.label();
        let applied = self.store.apply(id, ProfileChange::event(event, Utc::now()))?;
        self.log_changes(id, label, &applied);
        Ok(applied.profile)
    }

    fn log_changes(&self, id: &ProviderId, cause: &str, applied: &AppliedChange) {
        for (from, to) in applied.changes() {
            info!(
                provider = %id,
                cause,
                from = from.label(),
                to = to.label(),
                "verification status changed"
            );
        }
    }

    fn fetch_existing(&self, id: &ProviderId) -> Result<ProviderProfile, VerificationServiceError> {
        Ok(self.store.fetch(id)?.ok_or(StoreError::NotFound)?)
    }

    fn audit(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(err) = self.audit.record(entry) {
            warn!(action = action.label(), error = %err, "audit entry dropped");
        }
    }
}

/// Expected document values keyed by field, skipping fields the profile lacks.
pub fn expected_values(profile: &ProviderProfile) -> BTreeMap<String, String> {
    ATTESTED_FIELDS
        .iter()
        .filter_map(|field| profile.text(*field).map(|value| (field.key().to_string(), value)))
        .collect()
}

fn documents_with(profile: &ProviderProfile, document: &VerificationDocument) -> Value {
    let mut documents = match profile.fields.get(&ProfileField::VerificationDocuments) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    documents.push(json!({
        "name": document.name,
        "storageKey": document.storage_key,
    }));
    Value::Array(documents)
}

/// Error raised by the verification service.
#[derive(Debug, thiserror::Error)]
pub enum VerificationServiceError {
    #[error(transparent)]
    Classification(#[from] UnclassifiedField),
    #[error(transparent)]
    Lifecycle(#[from] TransitionError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for VerificationServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transition(err) => Self::Lifecycle(err),
            other => Self::Store(other),
        }
    }
}
