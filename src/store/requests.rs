// src/store/requests.rs
//
// Typed reset-request operations over the document store. Requests are
// created by the submission flow, mutated only by the admin review flow and
// never deleted here; retention is an external archival concern.
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{Documents, StoreError, REQUESTS_COLLECTION, USERS_COLLECTION};
use crate::models::{
    AdminIdentity, NewResetRequest, PasswordResetRequest, ResetStatus, UserRecord,
    UserSecurityFields,
};
use crate::notify::{ResetEvent, ResetNotifier};

/// Reviewer-applied changes to a request. `reviewed_at`/`reviewed_by` are
/// always stamped from the acting admin, not from the patch.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    pub status: Option<ResetStatus>,
    pub admin_notes: Option<String>,
}

#[derive(Clone)]
pub struct ResetRequestStore {
    docs: Arc<Documents>,
    notifier: Arc<dyn ResetNotifier>,
}

impl ResetRequestStore {
    pub fn new(docs: Arc<Documents>, notifier: Arc<dyn ResetNotifier>) -> Self {
        Self { docs, notifier }
    }

    // Human-readable unique ticket token: epoch seconds plus a random
    // suffix.
    fn next_request_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..4].to_uppercase();
        format!("PWR-{}-{}", Utc::now().timestamp(), suffix)
    }

    /// Submit a new reset request. Validates required fields, confirms the
    /// username references an existing account, persists the request as
    /// `pending` and notifies the admin channel. Nothing is persisted on
    /// failure.
    pub async fn submit(&self, new: NewResetRequest) -> Result<PasswordResetRequest, StoreError> {
        for (field, value) in [
            ("username", &new.username),
            ("firstName", &new.first_name),
            ("lastName", &new.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Validation(format!("{} is required", field)));
            }
        }

        if let Some(email) = &new.email {
            if !email.contains('@') {
                return Err(StoreError::Validation("email address is invalid".into()));
            }
        }

        if self.find_user_by_username(&new.username).await?.is_none() {
            return Err(StoreError::UserNotFound(new.username));
        }

        let request = PasswordResetRequest {
            request_id: Self::next_request_id(),
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone_number: new.phone_number,
            reason: new.reason,
            additional_info: new.additional_info,
            status: ResetStatus::Pending,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            admin_notes: None,
        };

        self.docs
            .create(
                REQUESTS_COLLECTION,
                &request.request_id,
                &serde_json::to_value(&request)?,
            )
            .await?;

        log::info!(
            "reset request {} submitted for user {}",
            request.request_id,
            request.username
        );
        self.notifier.notify(&ResetEvent::RequestSubmitted {
            request_id: request.request_id.clone(),
            username: request.username.clone(),
        });

        Ok(request)
    }

    /// All requests, newest-submitted first.
    pub async fn list(&self) -> Result<Vec<PasswordResetRequest>, StoreError> {
        let documents = self.docs.list(REQUESTS_COLLECTION).await?;

        let mut requests = Vec::with_capacity(documents.len());
        for (_, body) in documents {
            requests.push(serde_json::from_value::<PasswordResetRequest>(body)?);
        }

        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    pub async fn get(&self, request_id: &str) -> Result<PasswordResetRequest, StoreError> {
        let body = self
            .docs
            .get(REQUESTS_COLLECTION, request_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        Ok(serde_json::from_value(body)?)
    }

    /// Exact-match account lookup. Admin-side only: invoked as the
    /// submission-time existence check and to resolve the target account at
    /// approval time, never exposed as a general enumeration API.
    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.find_user_by("username", username).await
    }

    /// Exact-match lookup by registered email, for the email-link completion
    /// path.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.find_user_by("email", email).await
    }

    async fn find_user_by(&self, field: &str, value: &str) -> Result<Option<UserRecord>, StoreError> {
        let hits = self
            .docs
            .query(USERS_COLLECTION, field, &json!(value))
            .await?;

        match hits.into_iter().next() {
            Some((_, body)) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Seed a user document. Account records are externally owned; this
    /// exists for embedding and test fixtures.
    pub async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.docs
            .create(USERS_COLLECTION, &user.id, &serde_json::to_value(user)?)
            .await
    }

    /// Apply a reviewer patch, stamping `reviewed_at`/`reviewed_by` from the
    /// acting admin. Last write wins.
    pub async fn update(
        &self,
        request_id: &str,
        patch: &RequestPatch,
        admin: &AdminIdentity,
    ) -> Result<(), StoreError> {
        let patch = Self::review_patch(patch, admin)?;
        self.docs.update(REQUESTS_COLLECTION, request_id, &patch).await
    }

    /// Apply a reviewer patch only while the request is still `pending`.
    /// A lost race with another admin surfaces as [`StoreError::Conflict`].
    pub async fn update_if_pending(
        &self,
        request_id: &str,
        patch: &RequestPatch,
        admin: &AdminIdentity,
    ) -> Result<(), StoreError> {
        let patch = Self::review_patch(patch, admin)?;
        self.docs
            .update_if(REQUESTS_COLLECTION, request_id, &patch, "status", &json!("pending"))
            .await
    }

    fn review_patch(patch: &RequestPatch, admin: &AdminIdentity) -> Result<Value, StoreError> {
        let mut body = json!({
            "reviewedAt": Utc::now(),
            "reviewedBy": admin.email,
        });
        if let Some(status) = patch.status {
            body["status"] = serde_json::to_value(status)?;
        }
        if let Some(notes) = &patch.admin_notes {
            body["adminNotes"] = json!(notes);
        }
        Ok(body)
    }

    /// Overwrite the security fields on a user record. Only the approval
    /// orchestrator calls this.
    pub async fn update_user_security(
        &self,
        user_id: &str,
        fields: &UserSecurityFields,
    ) -> Result<(), StoreError> {
        self.docs
            .update(USERS_COLLECTION, user_id, &serde_json::to_value(fields)?)
            .await
    }

    /// Clear every security field in one patch. Called by the login flow
    /// when a forced change completes; the single write keeps the invariant
    /// that `mustChangePassword` is never left set alongside a rotated
    /// password.
    pub async fn clear_user_security(&self, user_id: &str) -> Result<(), StoreError> {
        self.update_user_security(user_id, &UserSecurityFields::default())
            .await
    }
}
