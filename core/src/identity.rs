use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::UserId;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self) -> Result<UserId, AuthError>;
}

/// Signs in with a token handed over by the caller, e.g. from an environment
/// variable. The token itself is the identity.
pub struct TokenIdentity {
    token: String,
}

impl TokenIdentity {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for TokenIdentity {
    async fn sign_in(&self) -> Result<UserId, AuthError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(UserId::new(token))
    }
}

/// Anonymous identity that survives restarts by keeping a generated id in a file.
pub struct AnonymousIdentity {
    path: PathBuf,
}

impl AnonymousIdentity {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_or_create(&self) -> anyhow::Result<UserId> {
        if self.path.exists() {
            let id = std::fs::read_to_string(&self.path).with_context(|| {
                format!("Failed to read identity file: {}", self.path.display())
            })?;
            let id = id.trim();
            if !id.is_empty() {
                return Ok(UserId::new(id));
            }
        }

        let id = format!("anon-{}", Uuid::new_v4());
        std::fs::write(&self.path, &id).with_context(|| {
            format!("Failed to write identity file: {}", self.path.display())
        })?;
        tracing::info!(user = %id, "created anonymous identity");
        Ok(UserId::new(id))
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn sign_in(&self) -> Result<UserId, AuthError> {
        self.load_or_create().map_err(AuthError::SignIn)
    }
}
