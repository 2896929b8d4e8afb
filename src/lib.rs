//! resetvault - password lifecycle subsystem for an admin-mediated banking
//! front end.
//!
//! The crate covers password generation and strength assessment, the
//! reset-request workflow (submission, admin review, approval or rejection)
//! and the forced-change login contract. It is a library consumed by a UI
//! layer; the external authentication provider and document database are
//! reached only through the narrow interfaces in [`auth`] and [`store`].

pub mod approval;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod generators;
pub mod login;
pub mod models;
pub mod notify;
pub mod store;
pub mod strength;

pub use approval::{ApprovalError, ApprovalOutcome, ApprovalService};
pub use auth::{AuthError, AuthGateway, MemoryAuthGateway, Session};
pub use config::Config;
pub use crypto::SecretField;
pub use generators::{GeneratorError, PasswordGenerator, StrengthAssessment, StrengthLabel};
pub use login::{LoginError, LoginFlow, LoginOutcome};
pub use models::{
    AdminIdentity, NewResetRequest, PasswordPolicy, PasswordResetRequest, ResetMethod, ResetReason,
    ResetStatus, UserRecord, UserSecurityFields,
};
pub use notify::{LogNotifier, ResetEvent, ResetNotifier};
pub use store::{Documents, RequestPatch, ResetRequestStore, StoreError};
pub use strength::{
    meets_signup_minimum, validate_password_strength, PasswordRequirements, StrengthReport,
};
