// src/login.rs
//
// Downstream consumer of the approval flow: intercepts sign-in while
// `mustChangePassword` is set, accepts the admin-issued temporary password
// as a one-time bypass, and clears all reset-tracking fields in a single
// write once the forced change completes.
use thiserror::Error;

use crate::auth::{AuthError, AuthGateway, Session};
use crate::crypto::{self, CryptoError};
use crate::models::UserRecord;
use crate::store::{ResetRequestStore, StoreError};
use crate::strength::validate_password_strength;
use crate::Config;

#[derive(Debug, Error)]
pub enum LoginError {
    // Deliberately indistinguishable between unknown-username and
    // wrong-password; sign-in is not an enumeration oracle.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("New password does not meet requirements: {0}")]
    WeakPassword(String),

    #[error("Passwords do not match")]
    ConfirmationMismatch,

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Authentication service error: {0}")]
    Auth(AuthError),

    #[error("Secret field error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type Result<T> = std::result::Result<T, LoginError>;

/// Where a successful sign-in lands.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Normal destination.
    Success { session: Session },
    /// The account is flagged; the UI must route to the forced
    /// password-change screen before granting normal access.
    ForcedChange { user: UserRecord },
}

pub struct LoginFlow<G: AuthGateway> {
    store: ResetRequestStore,
    gateway: G,
    field_key: Vec<u8>,
}

impl<G: AuthGateway> LoginFlow<G> {
    pub fn new(
        store: ResetRequestStore,
        gateway: G,
        config: &Config,
    ) -> std::result::Result<Self, CryptoError> {
        let field_key = crypto::derive_field_key(&config.field_secret, "temporary-password")?;
        Ok(Self {
            store,
            gateway,
            field_key,
        })
    }

    /// Authenticate by username. A set forced-change flag redirects to the
    /// change screen regardless of which reset method produced it; the
    /// sealed temporary password is accepted in place of the provider
    /// credential for exactly that transition.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(LoginError::InvalidCredentials)?;

        match self.gateway.sign_in(&user.email, password).await {
            Ok(session) => {
                if user.security.must_change_password {
                    log::info!("login for {} intercepted: password change required", username);
                    Ok(LoginOutcome::ForcedChange { user })
                } else {
                    Ok(LoginOutcome::Success { session })
                }
            }
            Err(AuthError::InvalidCredentials) => {
                if user.security.must_change_password {
                    if let Some(sealed) = &user.security.temporary_password {
                        if sealed.reveal(&self.field_key)? == password {
                            log::info!("temporary password accepted for {}", username);
                            return Ok(LoginOutcome::ForcedChange { user });
                        }
                    }
                }
                Err(LoginError::InvalidCredentials)
            }
            Err(e) => Err(LoginError::Auth(e)),
        }
    }

    /// Complete the in-app forced change: gate on the full evaluator score,
    /// rotate the credential at the provider, then clear every
    /// reset-tracking field in one atomic patch.
    pub async fn complete_forced_change(
        &self,
        username: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if new_password != confirm_password {
            return Err(LoginError::ConfirmationMismatch);
        }

        let report = validate_password_strength(new_password);
        if !report.satisfies_all() {
            return Err(LoginError::WeakPassword(
                report.requirements.unmet().join(", "),
            ));
        }

        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| LoginError::UnknownUser(username.to_string()))?;

        self.gateway
            .update_password(&user.email, new_password)
            .await
            .map_err(LoginError::Auth)?;

        self.store.clear_user_security(&user.id).await?;
        log::info!("forced password change completed for {}", username);

        Ok(())
    }

    /// Complete an email-link reset: resolve the action token, set the new
    /// password through the provider, then clear the flags on the matching
    /// user record.
    pub async fn complete_email_reset(
        &self,
        action_token: &str,
        new_password: &str,
    ) -> Result<()> {
        let report = validate_password_strength(new_password);
        if !report.satisfies_all() {
            return Err(LoginError::WeakPassword(
                report.requirements.unmet().join(", "),
            ));
        }

        let email = self
            .gateway
            .verify_reset_action_token(action_token)
            .await
            .map_err(LoginError::Auth)?;

        self.gateway
            .confirm_password_reset(action_token, new_password)
            .await
            .map_err(LoginError::Auth)?;

        if let Some(user) = self.store.find_user_by_email(&email).await? {
            self.store.clear_user_security(&user.id).await?;
            log::info!("email-link password reset completed for {}", user.username);
        } else {
            // The provider account exists without a matching user document;
            // the credential is rotated either way.
            log::warn!("email-link reset completed for unmatched address {}", email);
        }

        Ok(())
    }
}
