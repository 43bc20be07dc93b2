use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use provider_trust::workflows::verification::{
    fold_change, AppliedChange, AuditEntry, AuditError, AuditLog, DocumentTextExtractor,
    ExtractionError, ProfileChange, ProfileStore, ProviderId, ProviderProfile, StoreError,
    VerificationDocument, VerificationStatus,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryProfileStore {
    profiles: Arc<Mutex<HashMap<ProviderId, ProviderProfile>>>,
}

impl InMemoryProfileStore {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ProviderId, ProviderProfile>>, StoreError> {
        self.profiles
            .lock()
            .map_err(|_| StoreError::Unavailable("profile store lock poisoned".to_string()))
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn insert(&self, profile: ProviderProfile) -> Result<ProviderProfile, StoreError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&profile.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    // Folded against the stored copy under the lock; the map only sees the
    // finished profile.
    fn apply(&self, id: &ProviderId, change: ProfileChange) -> Result<AppliedChange, StoreError> {
        let mut guard = self.lock()?;
        let current = guard.get(id).ok_or(StoreError::NotFound)?;
        let applied = fold_change(current, change)?;
        guard.insert(id.clone(), applied.profile.clone());
        Ok(applied)
    }

    fn pending(&self, limit: usize) -> Result<Vec<ProviderProfile>, StoreError> {
        let guard = self.lock()?;
        let mut pending = guard
            .values()
            .filter(|profile| profile.status() == VerificationStatus::Pending)
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        pending.truncate(limit);
        Ok(pending)
    }
}

/// Writes audit entries to the tracing pipeline and keeps them for inspection.
#[derive(Default, Clone)]
pub(crate) struct TracingAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl TracingAuditLog {
    pub(crate) fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AuditLog for TracingAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "audit",
            action = entry.action.label(),
            provider = %entry.target,
            reason = entry.reason.as_deref().unwrap_or(""),
            recorded_at = %Utc::now().to_rfc3339(),
            "audit"
        );
        self.entries
            .lock()
            .map_err(|_| AuditError::Transport("audit buffer lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}

/// Uses text the client extracted before upload.
#[derive(Default, Clone, Copy)]
pub(crate) struct InlineTextExtractor;

impl DocumentTextExtractor for InlineTextExtractor {
    fn extract_text(&self, document: &VerificationDocument) -> Result<String, ExtractionError> {
        document
            .extracted_text
            .clone()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ExtractionError::Unreadable(document.name.clone()))
    }
}

/// Parses a `key=value` expectation given on the command line.
pub(crate) fn parse_expectation(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
