use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use provider_trust::workflows::verification::{
    fold_change, AppliedChange, AuditAction, AuditEntry, AuditError, AuditLog,
    DocumentTextExtractor, ExtractionError, ProfileChange, ProfileField, ProfileStore,
    ProfileUpdate, ProviderId, ProviderProfile, ProviderVerificationService, StoreError,
    VerificationDocument, VerificationSettings, VerificationStatus,
};
use serde_json::json;

const PHARMACY_LICENCE: &str = "Licence d'exploitation de pharmacie\n\
Numéro : PH-2018-00231\n\
Officine : Pharmacie du Port\n\
Titulaire : Fatou Sow\n\
Délivrée par l'Ordre des Pharmaciens";

#[derive(Default)]
struct Store {
    profiles: Mutex<HashMap<ProviderId, ProviderProfile>>,
}

impl ProfileStore for Store {
    fn insert(&self, profile: ProviderProfile) -> Result<ProviderProfile, StoreError> {
        let mut guard = self.profiles.lock().expect("store mutex poisoned");
        guard.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError> {
        Ok(self.profiles.lock().expect("store mutex poisoned").get(id).cloned())
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
        Ok(guard
            .values()
            .filter(|profile| profile.status() == VerificationStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct Audit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog for Audit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().expect("audit mutex poisoned").push(entry);
        Ok(())
    }
}

struct AttachedText;

impl DocumentTextExtractor for AttachedText {
    fn extract_text(&self, document: &VerificationDocument) -> Result<String, ExtractionError> {
        document
            .extracted_text
            .clone()
            .ok_or_else(|| ExtractionError::Unavailable("no OCR backend".to_string()))
    }
}

fn pharmacy() -> ProfileUpdate {
    ProfileUpdate::new()
        .with("name", "Pharmacie du Port")
        .with("registrationNumber", "PH-2018-00231")
        .with("legalRepresentative", "Fatou Sow")
        .with("address", "3 Boulevard de la Libération")
        .with("city", "Dakar")
        .with("schedule", json!({ "mon-sat": "08:00-22:00" }))
}

fn licence(text: Option<&str>) -> VerificationDocument {
    VerificationDocument {
        name: "licence.pdf".to_string(),
        storage_key: "providers/licence.pdf".to_string(),
        extracted_text: text.map(str::to_string),
    }
}

#[test]
fn listing_moves_through_the_full_trust_lifecycle() {
    let store = Arc::new(Store::default());
    let audit = Arc::new(Audit::default());
    let service = ProviderVerificationService::new(
        store.clone(),
        Arc::new(AttachedText),
        audit.clone(),
        VerificationSettings::default(),
    );

    let profile = service.register(pharmacy()).expect("registration succeeds");
    assert!(!profile.is_public());

    let scored = service
        .submit_document(&profile.id, licence(Some(PHARMACY_LICENCE)))
        .expect("document scored");
    assert!(scored.result.success, "{:?}", scored.result.fields);
    assert!(scored.result.overall_score >= 0.75);
    assert_eq!(scored.profile.status(), VerificationStatus::Pending);
    assert_eq!(service.review_queue(10).expect("queue").len(), 1);

    let approved = service
        .approve(&profile.id, "moderation@annuaire.test")
        .expect("approval succeeds");
    assert!(approved.is_public());
    assert!(service.review_queue(10).expect("queue").is_empty());

    let edit = service
        .update_profile(
            &profile.id,
            ProfileUpdate::new().with("schedule", json!({ "mon-sun": "08:00-23:00" })),
        )
        .expect("schedule edit");
    assert!(!edit.revoked);
    assert!(edit.profile.is_public());

    let edit = service
        .update_profile(
            &profile.id,
            ProfileUpdate::new()
                .with("description", "Garde de nuit le vendredi")
                .with("legalRepresentative", "Awa Sow"),
        )
        .expect("representative edit");
    assert!(edit.revoked);
    assert_eq!(edit.sensitive_fields, vec![ProfileField::LegalRepresentative]);
    let view = edit.profile.view();
    assert_eq!(view.status, "revoked");
    assert!(!view.is_public);
    assert_eq!(
        view.revoked_reason.as_deref(),
        Some("Modified: legalRepresentative")
    );
    assert_eq!(view.fields["legalRepresentative"], json!("Awa Sow"));

    // New representative no longer matches the old licence.
    let rescored = service
        .submit_document(&profile.id, licence(Some(PHARMACY_LICENCE)))
        .expect("document rescored");
    assert!(!rescored.result.fields["legalRepresentative"].found);
    assert_eq!(rescored.profile.status(), VerificationStatus::Pending);
    assert!(rescored.profile.view().revoked_reason.is_none());
    assert_eq!(
        rescored.profile.fields[&ProfileField::VerificationDocuments]
            .as_array()
            .map(Vec::len),
        Some(2)
    );

    let actions = audit
        .entries
        .lock()
        .expect("audit mutex poisoned")
        .iter()
        .map(|entry| entry.action)
        .collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![
            AuditAction::ProfileRegistered,
            AuditAction::DocumentScored,
            AuditAction::VerificationApproved,
            AuditAction::ProfileUpdated,
            AuditAction::VerificationRevoked,
            AuditAction::DocumentScored,
        ]
    );
}

#[test]
fn extraction_outage_yields_a_failed_score() {
    let service = ProviderVerificationService::new(
        Arc::new(Store::default()),
        Arc::new(AttachedText),
        Arc::new(Audit::default()),
        VerificationSettings::default(),
    );
    let profile = service.register(pharmacy()).expect("registration succeeds");

    let outcome = service
        .submit_document(&profile.id, licence(None))
        .expect("outage is not an error");

    assert!(!outcome.result.success);
    assert_eq!(outcome.result.overall_score, 0.0);
    assert_eq!(outcome.profile.status(), VerificationStatus::Pending);
}

#[test]
fn concurrent_edits_never_leave_a_public_modified_listing() {
    let store = Arc::new(Store::default());
    let service = Arc::new(ProviderVerificationService::new(
        store.clone(),
        Arc::new(AttachedText),
        Arc::new(Audit::default()),
        VerificationSettings::default(),
    ));
    let profile = service.register(pharmacy()).expect("registration succeeds");
    service
        .approve(&profile.id, "moderation@annuaire.test")
        .expect("approval succeeds");

    let handles = (0..8)
        .map(|index| {
            let service = service.clone();
            let id = profile.id.clone();
            std::thread::spawn(move || {
                let update = if index % 2 == 0 {
                    ProfileUpdate::new().with("description", format!("revision {index}"))
                } else {
                    ProfileUpdate::new().with("phone", format!("+221 77 000 00 0{index}"))
                };
                service.update_profile(&id, update).expect("edit succeeds")
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("edit thread");
    }

    let stored = store
        .fetch(&profile.id)
        .expect("store readable")
        .expect("profile stored");
    assert!(stored.fields.contains_key(&ProfileField::Phone));
    assert_eq!(stored.status(), VerificationStatus::Revoked);
    assert!(!stored.is_public());
}
