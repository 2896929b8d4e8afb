// src/approval.rs
//
// Admin approval state machine: pending -> approved (email | manual) or
// pending -> rejected. The request record and the target user's security
// fields are owned exclusively by this service during a transition.
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::auth::{AuthError, AuthGateway};
use crate::crypto::{self, CryptoError, SecretField};
use crate::generators::{GeneratorError, PasswordGenerator};
use crate::models::{
    AdminIdentity, PasswordPolicy, ResetMethod, ResetStatus, UserSecurityFields,
};
use crate::notify::{ResetEvent, ResetNotifier};
use crate::store::{RequestPatch, ResetRequestStore, StoreError};
use crate::Config;

#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The request references an account that no longer exists. Loud by
    /// design: submission validated the username, so this is an operational
    /// inconsistency.
    #[error("User account not found for username: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Authentication service error: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("Secret field error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type Result<T> = std::result::Result<T, ApprovalError>;

/// What the admin gets back from an approval. `temporary_password` is
/// populated only for the manual method and is the single place the
/// cleartext surfaces; it is never emailed and never logged.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub request_id: String,
    pub method: ResetMethod,
    pub temporary_password: Option<String>,
}

pub struct ApprovalService<G: AuthGateway> {
    store: ResetRequestStore,
    gateway: G,
    generator: PasswordGenerator,
    notifier: Arc<dyn ResetNotifier>,
    manual_policy: PasswordPolicy,
    field_key: Vec<u8>,
}

impl<G: AuthGateway> ApprovalService<G> {
    pub fn new(
        store: ResetRequestStore,
        gateway: G,
        notifier: Arc<dyn ResetNotifier>,
        config: &Config,
    ) -> std::result::Result<Self, CryptoError> {
        let field_key = crypto::derive_field_key(&config.field_secret, "temporary-password")?;
        Ok(Self {
            store,
            gateway,
            generator: PasswordGenerator::from_config(config),
            notifier,
            manual_policy: config.manual_reset_policy.clone(),
            field_key,
        })
    }

    /// Reject a pending request.
    ///
    /// Re-rejecting an already-rejected request refreshes the notes and
    /// review stamp without changing status semantics; rejecting an
    /// approved request fails with a conflict.
    pub async fn reject(
        &self,
        request_id: &str,
        reason: &str,
        admin: &AdminIdentity,
    ) -> Result<()> {
        let request = self.store.get(request_id).await?;

        let patch = RequestPatch {
            status: Some(ResetStatus::Rejected),
            admin_notes: Some(reason.to_string()),
        };

        match request.status {
            ResetStatus::Pending => {
                self.store.update_if_pending(request_id, &patch, admin).await?;
            }
            ResetStatus::Rejected => {
                self.store.update(request_id, &patch, admin).await?;
            }
            other => {
                return Err(StoreError::Conflict {
                    id: request_id.to_string(),
                    status: other.to_string(),
                }
                .into());
            }
        }

        log::info!(
            "request {} rejected by {}: {}",
            request_id,
            admin.email,
            reason
        );
        self.notifier.notify(&ResetEvent::RequestRejected {
            request_id: request_id.to_string(),
            username: request.username,
        });

        Ok(())
    }

    /// Approve a pending request with the chosen method.
    ///
    /// For `Manual`, `manual_password` is used when supplied; otherwise a
    /// password is generated under the manual-reset policy. Any failure
    /// before the final request transition leaves the request `pending` and
    /// surfaces the error; retry is an explicit admin action.
    pub async fn approve(
        &self,
        request_id: &str,
        method: ResetMethod,
        manual_password: Option<String>,
        admin: &AdminIdentity,
    ) -> Result<ApprovalOutcome> {
        let request = self.store.get(request_id).await?;
        if request.status != ResetStatus::Pending {
            return Err(StoreError::Conflict {
                id: request_id.to_string(),
                status: request.status.to_string(),
            }
            .into());
        }

        let user = self
            .store
            .find_user_by_username(&request.username)
            .await?
            .ok_or_else(|| ApprovalError::UserNotFound(request.username.clone()))?;

        let mut fields = UserSecurityFields {
            must_change_password: true,
            password_reset_method: Some(method),
            password_reset_by: Some(admin.email.clone()),
            password_reset_at: Some(Utc::now()),
            password_reset_request_id: Some(request_id.to_string()),
            ..Default::default()
        };

        let temporary_password = match method {
            ResetMethod::Email => {
                self.gateway.send_password_reset_email(&user.email).await?;
                fields.password_reset_email_sent = true;
                None
            }
            ResetMethod::Manual => {
                let password = match manual_password {
                    Some(password) => password,
                    None => self.generator.generate(&self.manual_policy)?,
                };
                fields.temporary_password = Some(SecretField::seal(&self.field_key, &password)?);
                fields.admin_must_communicate_password = true;
                Some(password)
            }
        };

        self.store.update_user_security(&user.id, &fields).await?;

        let notes = match method {
            ResetMethod::Email => "Approved: reset email sent to registered address",
            ResetMethod::Manual => "Approved: temporary password issued by admin",
        };
        self.store
            .update_if_pending(
                request_id,
                &RequestPatch {
                    status: Some(ResetStatus::Approved),
                    admin_notes: Some(notes.to_string()),
                },
                admin,
            )
            .await?;

        log::info!(
            "request {} approved by {} via {}",
            request_id,
            admin.email,
            method
        );
        self.notifier.notify(&ResetEvent::RequestApproved {
            request_id: request_id.to_string(),
            username: request.username,
            method,
        });

        Ok(ApprovalOutcome {
            request_id: request_id.to_string(),
            method,
            temporary_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryAuthGateway;
    use crate::models::{NewResetRequest, ResetReason, UserRecord};
    use crate::notify::testing::RecordingNotifier;
    use crate::store::Documents;
    use crate::strength::validate_password_strength;

    struct Fixture {
        docs: Arc<Documents>,
        store: ResetRequestStore,
        service: ApprovalService<MemoryAuthGateway>,
        notifier: Arc<RecordingNotifier>,
        admin: AdminIdentity,
    }

    async fn fixture() -> Fixture {
        let notifier = Arc::new(RecordingNotifier::new());
        let docs = Arc::new(Documents::in_memory());
        let store =
            ResetRequestStore::new(docs.clone(), notifier.clone() as Arc<dyn ResetNotifier>);

        store
            .create_user(&UserRecord {
                id: "u-jdoe".into(),
                username: "jdoe".into(),
                email: "jdoe@example.com".into(),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                security: Default::default(),
            })
            .await
            .unwrap();

        let gateway = MemoryAuthGateway::with_account("jdoe@example.com", "Old-Password-1!");
        let service = ApprovalService::new(
            store.clone(),
            gateway,
            notifier.clone() as Arc<dyn ResetNotifier>,
            &Config::default(),
        )
        .unwrap();

        Fixture {
            docs,
            store,
            service,
            notifier,
            admin: AdminIdentity::new("a-1", "admin@example.com"),
        }
    }

    async fn submit(store: &ResetRequestStore) -> String {
        store
            .submit(NewResetRequest {
                username: "jdoe".into(),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: Some("jdoe@example.com".into()),
                phone_number: None,
                reason: ResetReason::Forgot,
                additional_info: None,
            })
            .await
            .unwrap()
            .request_id
    }

    #[tokio::test]
    async fn email_approval_sends_exactly_one_reset_email() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        let outcome = f
            .service
            .approve(&request_id, ResetMethod::Email, None, &f.admin)
            .await
            .unwrap();

        assert_eq!(outcome.method, ResetMethod::Email);
        assert!(outcome.temporary_password.is_none());
        assert_eq!(
            f.service.gateway.reset_emails_sent(),
            vec!["jdoe@example.com"]
        );

        let user = f.store.find_user_by_username("jdoe").await.unwrap().unwrap();
        assert!(user.security.must_change_password);
        assert_eq!(user.security.password_reset_method, Some(ResetMethod::Email));
        assert!(user.security.password_reset_email_sent);
        assert!(user.security.temporary_password.is_none());
        assert_eq!(
            user.security.password_reset_by.as_deref(),
            Some("admin@example.com")
        );
        assert_eq!(
            user.security.password_reset_request_id.as_deref(),
            Some(request_id.as_str())
        );

        let request = f.store.get(&request_id).await.unwrap();
        assert_eq!(request.status, ResetStatus::Approved);
    }

    #[tokio::test]
    async fn manual_approval_generates_a_conforming_temporary_password() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        let outcome = f
            .service
            .approve(&request_id, ResetMethod::Manual, None, &f.admin)
            .await
            .unwrap();

        let password = outcome.temporary_password.unwrap();
        assert_eq!(password.chars().count(), 12);
        // Default manual policy guarantees every class.
        let report = validate_password_strength(&password);
        assert!(report.requirements.uppercase);
        assert!(report.requirements.lowercase);
        assert!(report.requirements.numbers);
        assert!(report.requirements.special_chars);

        // No reset email for the manual method.
        assert!(f.service.gateway.reset_emails_sent().is_empty());

        let user = f.store.find_user_by_username("jdoe").await.unwrap().unwrap();
        assert!(user.security.must_change_password);
        assert_eq!(user.security.password_reset_method, Some(ResetMethod::Manual));
        assert!(user.security.admin_must_communicate_password);

        // Stored sealed, recoverable only with the field key.
        let sealed = user.security.temporary_password.unwrap();
        let key = crypto::derive_field_key(
            &Config::default().field_secret,
            "temporary-password",
        )
        .unwrap();
        assert_eq!(sealed.reveal(&key).unwrap(), password);
        assert_ne!(sealed.as_opaque(), password);
    }

    #[tokio::test]
    async fn manual_approval_keeps_an_admin_supplied_password() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        let outcome = f
            .service
            .approve(
                &request_id,
                ResetMethod::Manual,
                Some("Chosen-By-Admin-7!".into()),
                &f.admin,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.temporary_password.as_deref(),
            Some("Chosen-By-Admin-7!")
        );
    }

    #[tokio::test]
    async fn approving_a_request_for_a_missing_account_fails_loudly() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        // The account is renamed out from under the pending request; the
        // username lookup now misses.
        f.docs
            .update(
                crate::store::USERS_COLLECTION,
                "u-jdoe",
                &serde_json::json!({ "username": "jdoe-renamed" }),
            )
            .await
            .unwrap();

        let err = f
            .service
            .approve(&request_id, ResetMethod::Email, None, &f.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::UserNotFound(ref u) if u == "jdoe"));

        // The request was not silently approved.
        let request = f.store.get(&request_id).await.unwrap();
        assert_eq!(request.status, ResetStatus::Pending);
    }

    #[tokio::test]
    async fn approving_a_missing_request_is_not_found() {
        let f = fixture().await;
        let err = f
            .service
            .approve("PWR-missing", ResetMethod::Email, None, &f.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn approve_on_a_decided_request_conflicts() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        f.service
            .approve(&request_id, ResetMethod::Email, None, &f.admin)
            .await
            .unwrap();

        let err = f
            .service
            .approve(&request_id, ResetMethod::Email, None, &f.admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Store(StoreError::Conflict { .. })
        ));
        // The side effect from the first approval is not repeated.
        assert_eq!(f.service.gateway.reset_emails_sent().len(), 1);
    }

    #[tokio::test]
    async fn reject_is_idempotent_on_a_rejected_request() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        f.service
            .reject(&request_id, "insufficient verification", &f.admin)
            .await
            .unwrap();
        let first = f.store.get(&request_id).await.unwrap();
        assert_eq!(first.status, ResetStatus::Rejected);

        f.service
            .reject(&request_id, "confirmed duplicate", &f.admin)
            .await
            .unwrap();
        let second = f.store.get(&request_id).await.unwrap();
        assert_eq!(second.status, ResetStatus::Rejected);
        assert_eq!(second.admin_notes.as_deref(), Some("confirmed duplicate"));
    }

    #[tokio::test]
    async fn reject_after_approval_conflicts() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        f.service
            .approve(&request_id, ResetMethod::Email, None, &f.admin)
            .await
            .unwrap();

        let err = f
            .service
            .reject(&request_id, "too late", &f.admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Store(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn approval_emits_events() {
        let f = fixture().await;
        let request_id = submit(&f.store).await;

        f.service
            .approve(&request_id, ResetMethod::Email, None, &f.admin)
            .await
            .unwrap();

        let events = f.notifier.events();
        assert!(events.iter().any(|e| matches!(
            e,
            ResetEvent::RequestApproved {
                method: ResetMethod::Email,
                ..
            }
        )));
    }
}
