//! Declarative table of which profile fields back the verified badge.
//!
//! Classification depends only on the field that changed, never on the old or
//! new value. Revocation itself lives in [`super::lifecycle`].

use serde_json::Value;

use super::domain::{FieldSensitivity, ProfileField, ProfileUpdate, UnclassifiedField};

pub const fn classify(field: ProfileField) -> FieldSensitivity {
    match field {
        ProfileField::Name
        | ProfileField::LegalName
        | ProfileField::RegistrationNumber
        | ProfileField::RegistrationAuthority
        | ProfileField::Address
        | ProfileField::City
        | ProfileField::PostalCode
        | ProfileField::Coordinates
        | ProfileField::Phone
        | ProfileField::Email
        | ProfileField::LegalRepresentative
        | ProfileField::VerificationDocuments => FieldSensitivity::Sensitive,
        ProfileField::Description
        | ProfileField::Services
        | ProfileField::Specialties
        | ProfileField::Schedule
        | ProfileField::Accessibility
        | ProfileField::Gallery
        | ProfileField::SocialLinks
        | ProfileField::Pricing
        | ProfileField::Equipment
        | ProfileField::Languages
        | ProfileField::Website
        | ProfileField::Logo => FieldSensitivity::NonSensitive,
    }
}

pub const fn is_sensitive(field: ProfileField) -> bool {
    matches!(classify(field), FieldSensitivity::Sensitive)
}

pub fn is_sensitive_key(key: &str) -> Result<bool, UnclassifiedField> {
    ProfileField::from_key(key).map(is_sensitive)
}

pub fn fields_with(sensitivity: FieldSensitivity) -> Vec<ProfileField> {
    ProfileField::ordered()
        .into_iter()
        .filter(|field| classify(*field) == sensitivity)
        .collect()
}

/// Resolves every key of the update, failing on the first unknown one.
pub fn parse_update(
    update: &ProfileUpdate,
) -> Result<Vec<(ProfileField, Value)>, UnclassifiedField> {
    update
        .iter()
        .map(|(key, value)| ProfileField::from_key(key).map(|field| (field, value.clone())))
        .collect()
}

/// Sensitive fields touched by the update, in the order they were sent.
pub fn classify_update(update: &ProfileUpdate) -> Result<Vec<ProfileField>, UnclassifiedField> {
    let mut sensitive = Vec::new();
    for key in update.keys() {
        let field = ProfileField::from_key(key)?;
        if is_sensitive(field) && !sensitive.contains(&field) {
            sensitive.push(field);
        }
    }
    Ok(sensitive)
}
