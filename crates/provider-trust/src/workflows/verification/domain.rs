use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::scoring::VerificationResult;

/// Identifier wrapper for directory listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a change to a field invalidates an earlier verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSensitivity {
    Sensitive,
    NonSensitive,
}

/// Every attribute a provider profile can carry.
///
/// Identity, legal and location facts come first; they are the attributes a
/// verification attests to. Everything after `VerificationDocuments` is
/// listing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileField {
    Name,
    LegalName,
    RegistrationNumber,
    RegistrationAuthority,
    Address,
    City,
    PostalCode,
    Coordinates,
    Phone,
    Email,
    LegalRepresentative,
    VerificationDocuments,
    Description,
    Services,
    Specialties,
    Schedule,
    Accessibility,
    Gallery,
    SocialLinks,
    Pricing,
    Equipment,
    Languages,
    Website,
    Logo,
}

impl ProfileField {
    pub const fn ordered() -> [Self; 24] {
        [
            Self::Name,
            Self::LegalName,
            Self::RegistrationNumber,
            Self::RegistrationAuthority,
            Self::Address,
            Self::City,
            Self::PostalCode,
            Self::Coordinates,
            Self::Phone,
            Self::Email,
            Self::LegalRepresentative,
            Self::VerificationDocuments,
            Self::Description,
            Self::Services,
            Self::Specialties,
            Self::Schedule,
            Self::Accessibility,
            Self::Gallery,
            Self::SocialLinks,
            Self::Pricing,
            Self::Equipment,
            Self::Languages,
            Self::Website,
            Self::Logo,
        ]
    }

    /// Key used in updates, stored documents and revocation reasons.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::LegalName => "legalName",
            Self::RegistrationNumber => "registrationNumber",
            Self::RegistrationAuthority => "registrationAuthority",
            Self::Address => "address",
            Self::City => "city",
            Self::PostalCode => "postalCode",
            Self::Coordinates => "coordinates",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::LegalRepresentative => "legalRepresentative",
            Self::VerificationDocuments => "verificationDocuments",
            Self::Description => "description",
            Self::Services => "services",
            Self::Specialties => "specialties",
            Self::Schedule => "schedule",
            Self::Accessibility => "accessibility",
            Self::Gallery => "gallery",
            Self::SocialLinks => "socialLinks",
            Self::Pricing => "pricing",
            Self::Equipment => "equipment",
            Self::Languages => "languages",
            Self::Website => "website",
            Self::Logo => "logo",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::LegalName => "Legal name",
            Self::RegistrationNumber => "Registration number",
            Self::RegistrationAuthority => "Registering authority",
            Self::Address => "Address",
            Self::City => "City",
            Self::PostalCode => "Postal code",
            Self::Coordinates => "Map coordinates",
            Self::Phone => "Phone",
            Self::Email => "Email",
            Self::LegalRepresentative => "Legal representative",
            Self::VerificationDocuments => "Verification documents",
            Self::Description => "Description",
            Self::Services => "Services",
            Self::Specialties => "Specialties",
            Self::Schedule => "Opening hours",
            Self::Accessibility => "Accessibility",
            Self::Gallery => "Gallery",
            Self::SocialLinks => "Social links",
            Self::Pricing => "Pricing",
            Self::Equipment => "Equipment",
            Self::Languages => "Languages",
            Self::Website => "Website",
            Self::Logo => "Logo",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, UnclassifiedField> {
        Self::ordered()
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| UnclassifiedField(key.to_string()))
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raised when an update names a field absent from the sensitivity table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field `{0}` is not classified in the sensitivity table")]
pub struct UnclassifiedField(pub String);

/// Proposed edit: field key to new value, in the order the caller sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileUpdate(pub serde_json::Map<String, Value>);

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// Lifecycle status of a listing's verification badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    Revoked,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Revoked => "revoked",
        }
    }
}

/// Record of an automatic revocation caused by sensitive edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revocation {
    pub fields: Vec<ProfileField>,
    pub revoked_at: DateTime<Utc>,
}

impl Revocation {
    pub const REASON_PREFIX: &'static str = "Modified:";

    /// Display form consumed by the listing pages, e.g. `Modified: address, phone`.
    pub fn reason(&self) -> String {
        let keys = self
            .fields
            .iter()
            .map(|field| field.key())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}", Self::REASON_PREFIX, keys)
    }
}

/// Verification sub-document stored alongside the profile content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationState {
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<Revocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<VerificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

impl VerificationState {
    pub fn pending() -> Self {
        Self {
            status: VerificationStatus::Pending,
            revocation: None,
            rejection_reason: None,
            last_result: None,
            verified_at: None,
            reviewed_by: None,
        }
    }
}

impl Default for VerificationState {
    fn default() -> Self {
        Self::pending()
    }
}

/// Uploaded proof of registration. The OCR output may already be attached
/// when extraction happened upstream (e.g. in the browser).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDocument {
    pub name: String,
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

/// One directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub fields: BTreeMap<ProfileField, Value>,
    pub verification: VerificationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderProfile {
    pub fn status(&self) -> VerificationStatus {
        self.verification.status
    }

    /// Listings are only shown publicly while they hold a verified badge.
    pub fn is_public(&self) -> bool {
        self.verification.status == VerificationStatus::Verified
    }

    /// Renders a field as plain text for document matching.
    pub fn text(&self, field: ProfileField) -> Option<String> {
        let rendered = match self.fields.get(&field)? {
            Value::String(value) => value.trim().to_string(),
            Value::Number(number) => number.to_string(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            _ => return None,
        };

        if rendered.is_empty() {
            None
        } else {
            Some(rendered)
        }
    }

    pub fn view(&self) -> ProfileView {
        let revocation = self.verification.revocation.as_ref();
        ProfileView {
            id: self.id.clone(),
            status: self.verification.status.label(),
            is_public: self.is_public(),
            revoked_reason: revocation.map(Revocation::reason),
            revoked_fields: revocation
                .map(|revocation| revocation.fields.clone())
                .unwrap_or_default(),
            revoked_at: revocation.map(|revocation| revocation.revoked_at),
            rejection_reason: self.verification.rejection_reason.clone(),
            last_score: self
                .verification
                .last_result
                .as_ref()
                .map(|result| result.overall_score),
            fields: self
                .fields
                .iter()
                .map(|(field, value)| (field.key().to_string(), value.clone()))
                .collect(),
        }
    }
}

/// Serialized representation of a listing for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: ProviderId,
    pub status: &'static str,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub revoked_fields: Vec<ProfileField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_score: Option<f64>,
    pub fields: BTreeMap<String, Value>,
}
