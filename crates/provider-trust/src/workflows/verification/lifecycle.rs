//! Verification status transitions.
//!
//! | from               | event                      | to       |
//! |--------------------|----------------------------|----------|
//! | pending            | approve                    | verified |
//! | pending            | reject                     | rejected |
//! | verified           | edit with sensitive fields | revoked  |
//! | revoked / rejected | resubmit                   | pending  |
//!
//! Changes are folded as a whole: [`plan_change`] returns the next profile with
//! content and verification already combined so a store persists both in a
//! single write.

use chrono::{DateTime, Utc};

use super::domain::{
    ProfileField, ProfileUpdate, ProviderProfile, Revocation, UnclassifiedField,
    VerificationState, VerificationStatus,
};
use super::scoring::VerificationResult;
use super::sensitivity;

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationEvent {
    Approve { reviewer: String },
    Reject { reason: String },
    ContentEdited { sensitive_fields: Vec<ProfileField> },
    Resubmitted { result: VerificationResult },
}

impl VerificationEvent {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::ContentEdited { .. } => "content_edited",
            Self::Resubmitted { .. } => "resubmitted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed {
        from: VerificationStatus,
        to: VerificationStatus,
    },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {event} a profile in status `{}`", .from.label())]
    InvalidTransition {
        from: VerificationStatus,
        event: &'static str,
    },
    #[error("profile is already verified; edit a sensitive field to restart verification")]
    AlreadyVerified,
}

impl VerificationState {
    pub fn apply(
        &mut self,
        event: VerificationEvent,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let from = self.status;
        match (from, event) {
            (VerificationStatus::Pending, VerificationEvent::Approve { reviewer }) => {
                self.status = VerificationStatus::Verified;
                self.rejection_reason = None;
                self.verified_at = Some(now);
                self.reviewed_by = Some(reviewer);
            }
            (VerificationStatus::Pending, VerificationEvent::Reject { reason }) => {
                self.status = VerificationStatus::Rejected;
                self.rejection_reason = Some(reason);
            }
            (
                VerificationStatus::Verified,
                VerificationEvent::ContentEdited { sensitive_fields },
            ) => {
                if sensitive_fields.is_empty() {
                    return Ok(Transition::Unchanged);
                }
                self.status = VerificationStatus::Revoked;
                self.revocation = Some(Revocation {
                    fields: sensitive_fields,
                    revoked_at: now,
                });
                self.verified_at = None;
            }
            (_, VerificationEvent::ContentEdited { .. }) => return Ok(Transition::Unchanged),
            (VerificationStatus::Verified, VerificationEvent::Resubmitted { .. }) => {
                return Err(TransitionError::AlreadyVerified);
            }
            (_, VerificationEvent::Resubmitted { result }) => {
                self.status = VerificationStatus::Pending;
                self.revocation = None;
                self.rejection_reason = None;
                self.reviewed_by = None;
                self.last_result = Some(result);
                if from == VerificationStatus::Pending {
                    return Ok(Transition::Unchanged);
                }
            }
            (from, event) => {
                return Err(TransitionError::InvalidTransition {
                    from,
                    event: event.label(),
                });
            }
        }

        Ok(Transition::Changed {
            from,
            to: self.status,
        })
    }
}

/// Profile after a change was folded onto it, with every status transition
/// the change caused. The first transition is always the content edit.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub profile: ProviderProfile,
    pub sensitive_fields: Vec<ProfileField>,
    pub transitions: Vec<Transition>,
}

impl AppliedChange {
    pub fn revoked(&self) -> bool {
        self.transitions.iter().any(|transition| {
            matches!(
                transition,
                Transition::Changed {
                    to: VerificationStatus::Revoked,
                    ..
                }
            )
        })
    }

    pub fn changes(&self) -> impl Iterator<Item = (VerificationStatus, VerificationStatus)> + '_ {
        self.transitions.iter().filter_map(|transition| match transition {
            Transition::Changed { from, to } => Some((*from, *to)),
            Transition::Unchanged => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Unclassified(#[from] UnclassifiedField),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Content-only edit. See [`plan_change`].
pub fn plan_edit(
    current: &ProviderProfile,
    update: &ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<AppliedChange, EditError> {
    plan_change(current, update, Vec::new(), now)
}

/// Folds `update` onto a copy of `current`, runs the content-edit transition
/// for its sensitive fields, then runs `events` in order.
///
/// The content-edit transition is not optional: a sensitive field written to
/// a verified profile always revokes it, whatever the caller asked for.
pub fn plan_change(
    current: &ProviderProfile,
    update: &ProfileUpdate,
    events: Vec<VerificationEvent>,
    now: DateTime<Utc>,
) -> Result<AppliedChange, EditError> {
    let changes = sensitivity::parse_update(update)?;
    let sensitive_fields = sensitivity::classify_update(update)?;

    let mut profile = current.clone();
    for (field, value) in changes {
        profile.fields.insert(field, value);
    }
    profile.updated_at = now;

    let edited = VerificationEvent::ContentEdited {
        sensitive_fields: sensitive_fields.clone(),
    };
    let mut transitions = Vec::with_capacity(events.len() + 1);
    for event in std::iter::once(edited).chain(events) {
        transitions.push(profile.verification.apply(event, now)?);
    }

    Ok(AppliedChange {
        profile,
        sensitive_fields,
        transitions,
    })
}
