use std::sync::Arc;

use crate::error::AuthError;
use crate::gateway::SyncGateway;
use crate::identity::IdentityProvider;
use crate::models::UserId;

/// Everything a signed-in client needs: who the user is and where their data
/// lives. Built once and passed down; nothing is global.
#[derive(Clone)]
pub struct ClientContext {
    user: UserId,
    gateway: Arc<dyn SyncGateway>,
}

impl ClientContext {
    pub async fn connect(
        identity: &dyn IdentityProvider,
        gateway: Arc<dyn SyncGateway>,
    ) -> Result<Self, AuthError> {
        let user = identity.sign_in().await?;
        tracing::info!(user = %user, "signed in");
        Ok(Self { user, gateway })
    }

    /// For callers that already hold an identity.
    #[must_use]
    pub fn for_user(user: UserId, gateway: Arc<dyn SyncGateway>) -> Self {
        Self { user, gateway }
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn gateway(&self) -> &dyn SyncGateway {
        self.gateway.as_ref()
    }
}
