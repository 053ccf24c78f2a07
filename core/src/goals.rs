use crate::context::ClientContext;
use crate::error::GatewayError;
use crate::gateway::Subscription;
use crate::models::GoalSettings;

/// Live goals. A user without a stored document sees the defaults.
pub struct GoalFeed {
    inner: Subscription<Option<GoalSettings>>,
}

impl GoalFeed {
    #[must_use]
    pub fn current(&self) -> GoalSettings {
        self.inner.current().unwrap_or_default()
    }

    pub async fn next(&mut self) -> Option<GoalSettings> {
        Some(self.inner.next().await?.unwrap_or_default())
    }

    pub fn unsubscribe(self) {
        self.inner.unsubscribe();
    }
}

#[derive(Clone)]
pub struct GoalStore {
    ctx: ClientContext,
}

impl GoalStore {
    #[must_use]
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    pub async fn load(&self) -> Result<GoalSettings, GatewayError> {
        let stored = self.ctx.gateway().read_goals(self.ctx.user()).await?;
        Ok(stored.unwrap_or_default())
    }

    /// Writes the full document. Calories always go out as derived from the macros.
    pub async fn save(&self, goals: &GoalSettings) -> Result<(), GatewayError> {
        self.ctx
            .gateway()
            .write_goals(self.ctx.user(), goals)
            .await?;
        tracing::info!(
            proteins = goals.proteins(),
            fats = goals.fats(),
            carbs = goals.carbs(),
            calories = goals.calories(),
            "saved goals"
        );
        Ok(())
    }

    pub async fn subscribe(&self) -> Result<GoalFeed, GatewayError> {
        let inner = self.ctx.gateway().subscribe_goals(self.ctx.user()).await?;
        Ok(GoalFeed { inner })
    }
}
