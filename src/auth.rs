// src/auth.rs
//
// The external authentication provider, consumed only through this narrow
// interface. The provider owns account credentials and the native
// reset-email machinery; this crate never sees its internals.
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired action token")]
    InvalidToken,

    #[error("Authentication service error: {0}")]
    Service(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// A successful sign-in.
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

/// Operations the authentication collaborator must provide.
pub trait AuthGateway: Send + Sync {
    /// Create an account, returning its provider-assigned id.
    async fn create_account(&self, email: &str, password: &str) -> Result<String>;

    /// Authenticate; fails with [`AuthError::InvalidCredentials`] on a bad
    /// password or unknown account.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Trigger the provider's native password-reset email.
    async fn send_password_reset_email(&self, email: &str) -> Result<()>;

    /// Finish a reset started by email link: consumes the action token and
    /// sets the new password.
    async fn confirm_password_reset(&self, action_token: &str, new_password: &str) -> Result<()>;

    /// Resolve an action token to the email it was issued for.
    async fn verify_reset_action_token(&self, action_token: &str) -> Result<String>;

    /// Rotate the password of an authenticated account (in-app change, no
    /// action token involved).
    async fn update_password(&self, email: &str, new_password: &str) -> Result<()>;
}

#[derive(Default)]
struct MemoryAuthState {
    // email -> password
    accounts: HashMap<String, String>,
    // token -> email
    tokens: HashMap<String, String>,
    reset_emails: Vec<String>,
}

/// In-process gateway: backs tests and local embedding without a live
/// provider. Sent reset emails and minted action tokens are observable.
#[derive(Default)]
pub struct MemoryAuthGateway {
    state: Mutex<MemoryAuthState>,
}

impl MemoryAuthGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(email: &str, password: &str) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state.lock().unwrap();
            state.accounts.insert(email.to_string(), password.to_string());
        }
        gateway
    }

    /// Every address a reset email was sent to, in order.
    pub fn reset_emails_sent(&self) -> Vec<String> {
        self.state.lock().unwrap().reset_emails.clone()
    }

    /// The most recent action token minted for `email`, if any.
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .iter()
            .find(|(_, e)| e.as_str() == email)
            .map(|(token, _)| token.clone())
    }

    pub fn password_for(&self, email: &str) -> Option<String> {
        self.state.lock().unwrap().accounts.get(email).cloned()
    }
}

impl AuthGateway for MemoryAuthGateway {
    async fn create_account(&self, email: &str, password: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(email) {
            return Err(AuthError::Service(format!("account exists: {}", email)));
        }
        state.accounts.insert(email.to_string(), password.to_string());
        Ok(Uuid::new_v4().to_string())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let state = self.state.lock().unwrap();
        match state.accounts.get(email) {
            Some(stored) if stored == password => Ok(Session {
                account_id: format!("acct-{}", email),
                email: email.to_string(),
                issued_at: Utc::now(),
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.accounts.contains_key(email) {
            return Err(AuthError::Service(format!("unknown account: {}", email)));
        }
        state.reset_emails.push(email.to_string());
        let token = Uuid::new_v4().to_string();
        state.tokens.insert(token, email.to_string());
        Ok(())
    }

    async fn confirm_password_reset(&self, action_token: &str, new_password: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let email = state
            .tokens
            .remove(action_token)
            .ok_or(AuthError::InvalidToken)?;
        state.accounts.insert(email, new_password.to_string());
        Ok(())
    }

    async fn verify_reset_action_token(&self, action_token: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(action_token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn update_password(&self, email: &str, new_password: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.accounts.get_mut(email) {
            Some(stored) => {
                *stored = new_password.to_string();
                Ok(())
            }
            None => Err(AuthError::InvalidCredentials),
        }
    }
}
