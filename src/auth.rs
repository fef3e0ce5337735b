// src/auth.rs

use crate::{
    config::LoginConfig,
    errors::{IntellexError, IntellexResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

/// Proof that someone signed in. Screens are only opened with one of these
/// when a login is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    pub id: Uuid,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

impl CapabilityToken {
    fn issue(email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            issued_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> IntellexResult<CapabilityToken>;
}

/// Checks credentials against the `login` section of the config file.
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    login: LoginConfig,
}

impl StaticAuthenticator {
    pub fn new(login: LoginConfig) -> Self {
        Self { login }
    }

    /// `None` when no login is configured, meaning authentication is skipped.
    pub fn from_config(login: Option<&LoginConfig>) -> Option<Self> {
        login.cloned().map(Self::new)
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> IntellexResult<CapabilityToken> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(IntellexError::auth_error("Email and password are required"));
        }

        if email.eq_ignore_ascii_case(self.login.email.trim()) && password == self.login.password {
            info!("Signed in as {}", email);
            Ok(CapabilityToken::issue(email))
        } else {
            warn!("Rejected sign-in attempt for {}", email);
            Err(IntellexError::auth_error("Invalid email or password"))
        }
    }
}
