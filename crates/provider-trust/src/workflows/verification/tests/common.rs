use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::workflows::verification::domain::{
    ProfileField, ProfileUpdate, ProviderId, ProviderProfile, VerificationDocument,
    VerificationState, VerificationStatus,
};
use crate::workflows::verification::lifecycle::{AppliedChange, VerificationEvent};
use crate::workflows::verification::repository::{
    fold_change, AuditEntry, AuditError, AuditLog, DocumentTextExtractor, ExtractionError,
    ProfileChange, ProfileStore, StoreError,
};
use crate::workflows::verification::scoring::{ScoringConfig, VerificationScorer};
use crate::workflows::verification::service::{ProviderVerificationService, VerificationSettings};

pub(super) const REGISTRATION_CERTIFICATE: &str = "RÉPUBLIQUE DU SÉNÉGAL\n\
Ministère de la Santé et de l'Action sociale\n\
Certificat d'enregistrement N° RC-2019-004512\n\
Établissement : Clinique Sainte-Anne\n\
Représentant légal : Dr. Aïssatou Ndiaye\n\
Autorité : Ordre des Médecins";

pub(super) const FOREIGN_CERTIFICATE: &str = "Certificat d'enregistrement N° RC-2020-999999\n\
Établissement : Centre Médical Horizon\n\
Représentant légal : Jean Dupont";

pub(super) fn clinic_fields() -> ProfileUpdate {
    ProfileUpdate::new()
        .with("name", "Clinique Sainte-Anne")
        .with("registrationNumber", "RC-2019-004512")
        .with("registrationAuthority", "Ordre des Médecins")
        .with("legalRepresentative", "Aïssatou Ndiaye")
        .with("address", "12 Rue Carnot")
        .with("city", "Dakar")
        .with("phone", "+221 33 821 00 00")
        .with("description", "Clinique pluridisciplinaire")
        .with("services", json!(["consultation", "radiologie"]))
}

pub(super) fn expected_fields() -> BTreeMap<String, String> {
    let mut expected = BTreeMap::new();
    expected.insert("name".to_string(), "Clinique Sainte-Anne".to_string());
    expected.insert("registrationNumber".to_string(), "RC-2019-004512".to_string());
    expected.insert("registrationAuthority".to_string(), "Ordre des Médecins".to_string());
    expected.insert("legalRepresentative".to_string(), "Aïssatou Ndiaye".to_string());
    expected
}

pub(super) fn scorer() -> VerificationScorer {
    VerificationScorer::new(ScoringConfig::default())
}

pub(super) fn certificate(text: &str) -> VerificationDocument {
    VerificationDocument {
        name: "registration-certificate.pdf".to_string(),
        storage_key: "providers/docs/registration-certificate.pdf".to_string(),
        extracted_text: Some(text.to_string()),
    }
}

pub(super) fn profile_with_status(id: &str, status: VerificationStatus) -> ProviderProfile {
    let created = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).single().expect("valid timestamp");
    let fields = clinic_fields()
        .iter()
        .map(|(key, value)| {
            (
                ProfileField::from_key(key).expect("fixture keys are classified"),
                value.clone(),
            )
        })
        .collect();
    let mut verification = VerificationState::pending();
    verification.status = status;

    ProviderProfile {
        id: ProviderId(id.to_string()),
        fields,
        verification,
        created_at: created,
        updated_at: created,
    }
}

pub(super) type TestService =
    ProviderVerificationService<MemoryStore, DocumentTextStub, MemoryAudit>;

pub(super) fn settings(auto_approve: bool) -> VerificationSettings {
    VerificationSettings {
        scoring: ScoringConfig::default(),
        auto_approve,
    }
}

pub(super) fn build_service() -> (TestService, Arc<MemoryStore>, Arc<MemoryAudit>) {
    build_service_with(settings(false))
}

pub(super) fn build_service_with(
    settings: VerificationSettings,
) -> (TestService, Arc<MemoryStore>, Arc<MemoryAudit>) {
    let store = Arc::new(MemoryStore::default());
    let audit = Arc::new(MemoryAudit::default());
    let service = ProviderVerificationService::new(
        store.clone(),
        Arc::new(DocumentTextStub),
        audit.clone(),
        settings,
    );
    (service, store, audit)
}

/// Registers the clinic fixture and approves it.
pub(super) fn verified_clinic(service: &TestService) -> ProviderProfile {
    let profile = service.register(clinic_fields()).expect("registration succeeds");
    service
        .approve(&profile.id, "admin@directory.test")
        .expect("approval succeeds")
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) profiles: Arc<Mutex<HashMap<ProviderId, ProviderProfile>>>,
}

impl MemoryStore {
    pub(super) fn snapshot(&self, id: &ProviderId) -> Option<ProviderProfile> {
        self.profiles
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl ProfileStore for MemoryStore {
    fn insert(&self, profile: ProviderProfile) -> Result<ProviderProfile, StoreError> {
        let mut guard = self.profiles.lock().expect("store mutex poisoned");
        if guard.contains_key(&profile.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError> {
        let guard = self.profiles.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn apply(&self, id: &ProviderId, change: ProfileChange) -> Result<AppliedChange, StoreError> {
        let mut guard = self.profiles.lock().expect("store mutex poisoned");
        let current = guard.get(id).ok_or(StoreError::NotFound)?;
        let applied = fold_change(current, change)?;
        guard.insert(id.clone(), applied.profile.clone());
        Ok(applied)
    }

    fn pending(&self, limit: usize) -> Result<Vec<ProviderProfile>, StoreError> {
        let guard = self.profiles.lock().expect("store mutex poisoned");
        let mut pending = guard
            .values()
            .filter(|profile| profile.status() == VerificationStatus::Pending)
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by(|left, right| left.id.cmp(&right.id));
        pending.truncate(limit);
        Ok(pending)
    }
}

/// Reads work, writes fail after the decision has been computed.
#[derive(Default, Clone)]
pub(super) struct ReadOnlyStore {
    pub(super) inner: MemoryStore,
}

impl ProfileStore for ReadOnlyStore {
    fn insert(&self, profile: ProviderProfile) -> Result<ProviderProfile, StoreError> {
        self.inner.insert(profile)
    }

    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError> {
        self.inner.fetch(id)
    }

    fn apply(&self, _id: &ProviderId, _change: ProfileChange) -> Result<AppliedChange, StoreError> {
        Err(StoreError::Unavailable("write quorum lost".to_string()))
    }

    fn pending(&self, limit: usize) -> Result<Vec<ProviderProfile>, StoreError> {
        self.inner.pending(limit)
    }
}

/// An administrator approval commits right before each content-only write,
/// after the caller last read the profile.
#[derive(Default, Clone)]
pub(super) struct ApprovalRaceStore {
    pub(super) inner: MemoryStore,
}

impl ProfileStore for ApprovalRaceStore {
    fn insert(&self, profile: ProviderProfile) -> Result<ProviderProfile, StoreError> {
        self.inner.insert(profile)
    }

    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError> {
        self.inner.fetch(id)
    }

    fn apply(&self, id: &ProviderId, change: ProfileChange) -> Result<AppliedChange, StoreError> {
        if change.events.is_empty() {
            let approval = VerificationEvent::Approve {
                reviewer: "admin@annuaire.test".to_string(),
            };
            self.inner.apply(id, ProfileChange::event(approval, change.updated_at))?;
        }
        self.inner.apply(id, change)
    }

    fn pending(&self, limit: usize) -> Result<Vec<ProviderProfile>, StoreError> {
        self.inner.pending(limit)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for MemoryAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().expect("audit mutex poisoned").push(entry);
        Ok(())
    }
}

pub(super) struct OfflineAudit;

impl AuditLog for OfflineAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Transport("collector offline".to_string()))
    }
}

/// Returns the text attached to the upload, as the browser-side OCR does.
pub(super) struct DocumentTextStub;

impl DocumentTextExtractor for DocumentTextStub {
    fn extract_text(&self, document: &VerificationDocument) -> Result<String, ExtractionError> {
        document
            .extracted_text
            .clone()
            .ok_or_else(|| ExtractionError::Unreadable(document.name.clone()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
