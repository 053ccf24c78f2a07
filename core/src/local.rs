use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::Database;
use crate::error::GatewayError;
use crate::gateway::{Subscription, SyncGateway};
use crate::models::{FoodEntry, GoalSettings, NewFoodEntry, UserId};

type DayKey = (UserId, NaiveDate);

#[derive(Default)]
struct Listeners {
    foods: HashMap<DayKey, watch::Sender<Vec<FoodEntry>>>,
    goals: HashMap<UserId, watch::Sender<Option<GoalSettings>>>,
}

/// SQLite-backed gateway. Live snapshots are fanned out through one watch
/// channel per `(user, date)` and one per user for goals.
pub struct LocalGateway {
    // Lock order: listeners, then db.
    db: Mutex<Database>,
    listeners: Arc<Mutex<Listeners>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalGateway {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Number of `(user, date)` and goal keys with at least one live listener.
    #[must_use]
    pub fn active_listeners(&self) -> usize {
        let listeners = lock(&self.listeners);
        listeners.foods.len() + listeners.goals.len()
    }

    /// Poll the database for commits made by other connections and republish
    /// every snapshot that changed. The task stops once the gateway is dropped.
    pub fn watch_external_changes(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let gateway: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let mut last_seen: Option<i64> = None;
            loop {
                ticker.tick().await;
                let Some(gateway) = gateway.upgrade() else {
                    break;
                };
                match gateway.refresh_if_changed(&mut last_seen) {
                    Ok(true) => tracing::debug!("picked up external changes"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!("change watcher failed: {e:#}"),
                }
            }
        })
    }

    /// Republishes every live snapshot after a commit from another connection.
    /// A listener whose query fails is skipped and the version is left
    /// unrecorded, so the next poll tries again.
    fn refresh_if_changed(&self, last_seen: &mut Option<i64>) -> Result<bool> {
        let listeners = lock(&self.listeners);
        let db = lock(&self.db);
        let version = db.data_version()?;
        if *last_seen == Some(version) {
            return Ok(false);
        }
        if last_seen.is_none() {
            *last_seen = Some(version);
            return Ok(false);
        }

        let mut failed = false;
        for ((user, date), sender) in &listeners.foods {
            match db.get_entries_for_date(user, *date) {
                Ok(entries) => {
                    sender.send_if_modified(|current| {
                        if *current == entries {
                            false
                        } else {
                            *current = entries;
                            true
                        }
                    });
                }
                Err(e) => {
                    failed = true;
                    tracing::warn!(user = %user, %date, "failed to refresh entries: {e:#}");
                }
            }
        }
        for (user, sender) in &listeners.goals {
            match db.get_goals(user) {
                Ok(goals) => {
                    sender.send_if_modified(|current| {
                        if *current == goals {
                            false
                        } else {
                            *current = goals;
                            true
                        }
                    });
                }
                Err(e) => {
                    failed = true;
                    tracing::warn!(user = %user, "failed to refresh goals: {e:#}");
                }
            }
        }
        if !failed {
            *last_seen = Some(version);
        }
        Ok(true)
    }

    fn publish_foods(&self, user: &UserId, date: NaiveDate) -> Result<()> {
        let listeners = lock(&self.listeners);
        if let Some(sender) = listeners.foods.get(&(user.clone(), date)) {
            let entries = lock(&self.db).get_entries_for_date(user, date)?;
            sender.send_replace(entries);
        }
        Ok(())
    }

    fn publish_goals(&self, user: &UserId) -> Result<()> {
        let listeners = lock(&self.listeners);
        if let Some(sender) = listeners.goals.get(user) {
            let goals = lock(&self.db).get_goals(user)?;
            sender.send_replace(goals);
        }
        Ok(())
    }

    fn release_foods(listeners: &Weak<Mutex<Listeners>>, key: &DayKey) {
        let Some(listeners) = listeners.upgrade() else {
            return;
        };
        let mut listeners = lock(&listeners);
        // The departing receiver is still counted while it is being dropped.
        if listeners
            .foods
            .get(key)
            .is_some_and(|sender| sender.receiver_count() <= 1)
        {
            listeners.foods.remove(key);
            tracing::debug!(user = %key.0, date = %key.1, "released food listener");
        }
    }

    fn release_goals(listeners: &Weak<Mutex<Listeners>>, user: &UserId) {
        let Some(listeners) = listeners.upgrade() else {
            return;
        };
        let mut listeners = lock(&listeners);
        if listeners
            .goals
            .get(user)
            .is_some_and(|sender| sender.receiver_count() <= 1)
        {
            listeners.goals.remove(user);
            tracing::debug!(user = %user, "released goals listener");
        }
    }
}

#[async_trait]
impl SyncGateway for LocalGateway {
    async fn subscribe_goals(
        &self,
        user: &UserId,
    ) -> Result<Subscription<Option<GoalSettings>>, GatewayError> {
        let rx = {
            let mut listeners = lock(&self.listeners);
            if let Some(sender) = listeners.goals.get(user) {
                sender.subscribe()
            } else {
                let goals = lock(&self.db).get_goals(user).map_err(GatewayError::Read)?;
                let (sender, rx) = watch::channel(goals);
                listeners.goals.insert(user.clone(), sender);
                rx
            }
        };
        let weak = Arc::downgrade(&self.listeners);
        let user = user.clone();
        Ok(Subscription::new(rx, move || {
            Self::release_goals(&weak, &user);
        }))
    }

    async fn subscribe_foods(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Subscription<Vec<FoodEntry>>, GatewayError> {
        let key = (user.clone(), date);
        let rx = {
            let mut listeners = lock(&self.listeners);
            if let Some(sender) = listeners.foods.get(&key) {
                sender.subscribe()
            } else {
                let entries = lock(&self.db)
                    .get_entries_for_date(user, date)
                    .map_err(GatewayError::Read)?;
                let (sender, rx) = watch::channel(entries);
                listeners.foods.insert(key.clone(), sender);
                rx
            }
        };
        let weak = Arc::downgrade(&self.listeners);
        Ok(Subscription::new(rx, move || {
            Self::release_foods(&weak, &key);
        }))
    }

    async fn create_food(
        &self,
        user: &UserId,
        entry: NewFoodEntry,
    ) -> Result<String, GatewayError> {
        let date = entry.date;
        let stored = lock(&self.db)
            .insert_food_entry(user, &entry)
            .map_err(GatewayError::Write)?;
        if let Err(e) = self.publish_foods(user, date) {
            tracing::warn!("failed to publish entries for {date}: {e:#}");
        }
        Ok(stored.id)
    }

    async fn delete_food(&self, user: &UserId, id: &str) -> Result<(), GatewayError> {
        let deleted_from = lock(&self.db)
            .delete_food_entry(user, id)
            .map_err(GatewayError::Write)?;
        if let Some(date) = deleted_from {
            if let Err(e) = self.publish_foods(user, date) {
                tracing::warn!("failed to publish entries for {date}: {e:#}");
            }
        }
        Ok(())
    }

    async fn read_goals(&self, user: &UserId) -> Result<Option<GoalSettings>, GatewayError> {
        lock(&self.db).get_goals(user).map_err(GatewayError::Read)
    }

    async fn write_goals(&self, user: &UserId, goals: &GoalSettings) -> Result<(), GatewayError> {
        lock(&self.db)
            .put_goals(user, goals)
            .map_err(GatewayError::Write)?;
        if let Err(e) = self.publish_goals(user) {
            tracing::warn!("failed to publish goals: {e:#}");
        }
        Ok(())
    }
}
