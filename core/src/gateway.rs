use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::Stream;
use futures_util::stream;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::models::{FoodEntry, GoalSettings, NewFoodEntry, UserId};

/// The per-user document store behind the ledger and the goal model.
///
/// Subscriptions push the current value immediately and then every change,
/// until the caller releases them.
#[async_trait]
pub trait SyncGateway: Send + Sync {
    async fn subscribe_goals(
        &self,
        user: &UserId,
    ) -> Result<Subscription<Option<GoalSettings>>, GatewayError>;

    async fn subscribe_foods(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Subscription<Vec<FoodEntry>>, GatewayError>;

    /// Persist a new entry and return its gateway-assigned id.
    async fn create_food(&self, user: &UserId, entry: NewFoodEntry)
    -> Result<String, GatewayError>;

    /// Succeeds silently when the entry is already gone.
    async fn delete_food(&self, user: &UserId, id: &str) -> Result<(), GatewayError>;

    async fn read_goals(&self, user: &UserId) -> Result<Option<GoalSettings>, GatewayError>;

    /// Overwrites the whole goals document.
    async fn write_goals(&self, user: &UserId, goals: &GoalSettings) -> Result<(), GatewayError>;
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// A live listener owned by the caller. Each new snapshot replaces the
/// previous one. Dropping the subscription, or calling [`Subscription::unsubscribe`],
/// releases the listener on the gateway side.
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    release: Option<Release>,
}

impl<T: Clone> Subscription<T> {
    /// Wrap a receiver. The current value counts as unseen, so the first
    /// [`Subscription::next`] resolves immediately.
    pub fn new(mut rx: watch::Receiver<T>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        rx.mark_changed();
        Self {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Latest snapshot without waiting.
    #[must_use]
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for a snapshot the caller has not seen yet. `None` once the
    /// gateway side has gone away.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static
    where
        T: Send + Sync + 'static,
    {
        stream::unfold(self, |mut sub| async move {
            let value = sub.next().await?;
            Some((value, sub))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
