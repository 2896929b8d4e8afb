// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::SecretField;

/// Lifecycle status of a reset request. Transitions are monotonic: a request
/// never returns to `Pending`. `Completed` exists for downstream consumers
/// and is never produced by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl std::fmt::Display for ResetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetStatus::Pending => write!(f, "pending"),
            ResetStatus::Approved => write!(f, "approved"),
            ResetStatus::Rejected => write!(f, "rejected"),
            ResetStatus::Completed => write!(f, "completed"),
        }
    }
}

/// How an approved reset is delivered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMethod {
    /// The auth provider's native reset email.
    Email,
    /// An admin-issued temporary password, communicated out of band.
    Manual,
}

impl std::fmt::Display for ResetMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetMethod::Email => write!(f, "email"),
            ResetMethod::Manual => write!(f, "manual"),
        }
    }
}

/// Why the user asked for a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetReason {
    Forgot,
    Compromised,
    Expired,
    Locked,
    Other,
}

/// Constraints for the password generation engine. All fields have sensible
/// defaults; at least one character class must stay enabled and the sum of
/// enabled per-class minimums must not exceed `length`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub length: usize,
    pub include_uppercase: bool,
    pub include_lowercase: bool,
    pub include_numbers: bool,
    pub include_special: bool,
    pub min_uppercase: usize,
    pub min_lowercase: usize,
    pub min_numbers: usize,
    pub min_special: usize,
    pub exclude_similar: bool,
    pub exclude_ambiguous: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            include_uppercase: true,
            include_lowercase: true,
            include_numbers: true,
            include_special: true,
            min_uppercase: 2,
            min_lowercase: 2,
            min_numbers: 2,
            min_special: 2,
            exclude_similar: false,
            exclude_ambiguous: false,
        }
    }
}

impl PasswordPolicy {
    /// Policy used when an admin approves a reset with a generated temporary
    /// password: 12 characters, all classes, two of each guaranteed.
    pub fn manual_reset() -> Self {
        Self {
            length: 12,
            ..Self::default()
        }
    }
}

/// A user's self-service request to have their password reset by an
/// administrator. Field names are the stable external schema read by the
/// notification system and the login flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub request_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub reason: ResetReason,
    #[serde(default)]
    pub additional_info: Option<String>,
    pub status: ResetStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Submission payload for a new reset request. `username`, `first_name`,
/// `last_name` and `reason` are required; the rest is contact detail for the
/// reviewing admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResetRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub reason: ResetReason,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// The subset of the externally-owned user record this subsystem mutates.
/// `must_change_password == true` obliges the login flow to intercept the
/// next successful sign-in; completion of the change clears every field here
/// in a single patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSecurityFields {
    pub must_change_password: bool,
    pub temporary_password: Option<SecretField>,
    pub password_reset_method: Option<ResetMethod>,
    pub password_reset_by: Option<String>,
    pub password_reset_at: Option<DateTime<Utc>>,
    pub password_reset_request_id: Option<String>,
    pub password_reset_email_sent: bool,
    pub admin_must_communicate_password: bool,
}

/// The slice of the user document this crate reads. Security fields live
/// flat on the record, matching the external schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub security: UserSecurityFields,
}

/// The acting administrator. Required on every state-mutating call; there is
/// no default identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: String,
    pub email: String,
}

impl AdminIdentity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}
