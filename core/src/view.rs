use chrono::NaiveDate;

use crate::context::ClientContext;
use crate::error::{Error, Result};
use crate::goals::{GoalFeed, GoalStore};
use crate::ledger::{DailyLedger, DayFeed, summarize};
use crate::models::{DailySummary, FoodEntry, GoalSettings};
use crate::nutrition::MacroDensity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Overview,
    AddEntry,
    Settings,
}

/// Input state of the add-entry screen.
#[derive(Debug, Clone, PartialEq)]
pub struct AddEntryForm {
    pub name: String,
    pub weight_g: f64,
    pub density: MacroDensity,
}

impl Default for AddEntryForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            weight_g: 100.0,
            density: MacroDensity::new(20.0, 5.0, 0.0),
        }
    }
}

impl AddEntryForm {
    #[must_use]
    pub fn preview_calories(&self) -> f64 {
        self.density.preview_calories(self.weight_g)
    }
}

struct OverviewFeeds {
    day: DayFeed,
    goals: GoalFeed,
}

/// Drives the three screens of a client. Live feeds are only held while the
/// overview is showing.
pub struct ViewController {
    ledger: DailyLedger,
    goals: GoalStore,
    screen: Screen,
    selected_date: NaiveDate,
    feeds: Option<OverviewFeeds>,
    add_form: AddEntryForm,
    settings_form: GoalSettings,
}

impl ViewController {
    /// Opens the overview for `date`.
    pub async fn start(ctx: ClientContext, date: NaiveDate) -> Result<Self> {
        let mut controller = Self {
            ledger: DailyLedger::new(ctx.clone()),
            goals: GoalStore::new(ctx),
            screen: Screen::Overview,
            selected_date: date,
            feeds: None,
            add_form: AddEntryForm::default(),
            settings_form: GoalSettings::default(),
        };
        controller.subscribe_overview().await?;
        Ok(controller)
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.screen
    }

    #[must_use]
    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    /// Switch the overview to another day. The previous day's feed is released
    /// before the new one is taken.
    pub async fn select_date(&mut self, date: NaiveDate) -> Result<()> {
        if date == self.selected_date {
            return self.refresh().await;
        }
        self.selected_date = date;
        if self.screen == Screen::Overview {
            self.feeds = None;
            self.subscribe_overview().await?;
        }
        Ok(())
    }

    /// Take the overview feeds again if an earlier subscribe failed.
    pub async fn refresh(&mut self) -> Result<()> {
        if self.screen == Screen::Overview && self.feeds.is_none() {
            self.subscribe_overview().await?;
        }
        Ok(())
    }

    pub fn open_add(&mut self) -> Result<()> {
        self.expect_screen(Screen::Overview, Screen::AddEntry)?;
        self.feeds = None;
        self.add_form = AddEntryForm::default();
        self.screen = Screen::AddEntry;
        Ok(())
    }

    pub async fn open_settings(&mut self) -> Result<()> {
        self.expect_screen(Screen::Overview, Screen::Settings)?;
        let goals = self.goals.load().await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to load goals");
        })?;
        self.feeds = None;
        self.settings_form = goals;
        self.screen = Screen::Settings;
        Ok(())
    }

    /// Leave the add-entry or settings screen without saving.
    pub async fn back(&mut self) -> Result<()> {
        if self.screen == Screen::Overview {
            return Err(Error::InvalidTransition {
                from: Screen::Overview,
                to: Screen::Overview,
            });
        }
        self.enter_overview().await
    }

    pub fn add_form(&self) -> &AddEntryForm {
        &self.add_form
    }

    pub fn add_form_mut(&mut self) -> &mut AddEntryForm {
        &mut self.add_form
    }

    pub fn settings_form(&self) -> &GoalSettings {
        &self.settings_form
    }

    pub fn settings_form_mut(&mut self) -> &mut GoalSettings {
        &mut self.settings_form
    }

    pub async fn save_entry(&mut self) -> Result<FoodEntry> {
        self.expect_screen(Screen::AddEntry, Screen::Overview)?;
        let form = &self.add_form;
        let entry = self
            .ledger
            .add(self.selected_date, &form.name, form.weight_g, form.density)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to save food entry"))?;
        self.enter_overview_after_save().await;
        Ok(entry)
    }

    pub async fn save_settings(&mut self) -> Result<()> {
        self.expect_screen(Screen::Settings, Screen::Overview)?;
        self.goals
            .save(&self.settings_form)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to save goals"))?;
        self.enter_overview_after_save().await;
        Ok(())
    }

    pub async fn delete_entry(&mut self, id: &str) -> Result<()> {
        self.require_overview()?;
        self.ledger
            .remove(id)
            .await
            .inspect_err(|e| tracing::error!(error = %e, %id, "failed to delete food entry"))?;
        Ok(())
    }

    /// Copy an entry of the selected day into today.
    pub async fn repeat_entry(&mut self, id: &str) -> Result<FoodEntry> {
        self.require_overview()?;
        let entry = self
            .feeds
            .as_ref()
            .and_then(|feeds| feeds.day.current().into_iter().find(|e| e.id == id))
            .ok_or_else(|| Error::NotFound(format!("Food entry {id}")))?;
        let copy = self
            .ledger
            .duplicate(&entry)
            .await
            .inspect_err(|e| tracing::error!(error = %e, %id, "failed to repeat food entry"))?;
        Ok(copy)
    }

    /// What the overview shows right now. `None` off the overview.
    #[must_use]
    pub fn overview(&self) -> Option<DailySummary> {
        let feeds = self.feeds.as_ref()?;
        Some(summarize(
            self.selected_date,
            feeds.day.current(),
            feeds.goals.current(),
        ))
    }

    /// Waits until either overview feed pushes a snapshot and returns the new
    /// summary. The first call after entering the overview resolves at once.
    /// `None` off the overview or once the gateway has gone away.
    pub async fn changed(&mut self) -> Option<DailySummary> {
        let OverviewFeeds { day, goals } = self.feeds.as_mut()?;
        tokio::select! {
            Some(_) = day.next() => {}
            Some(_) = goals.next() => {}
            else => return None,
        }
        self.overview()
    }

    fn expect_screen(&self, from: Screen, to: Screen) -> Result<()> {
        if self.screen == from {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.screen,
                to,
            })
        }
    }

    fn require_overview(&self) -> Result<()> {
        self.expect_screen(Screen::Overview, Screen::Overview)
    }

    async fn enter_overview(&mut self) -> Result<()> {
        self.screen = Screen::Overview;
        self.subscribe_overview().await
    }

    /// The write already landed, so a failed subscribe only leaves the overview
    /// without feeds until [`ViewController::refresh`].
    async fn enter_overview_after_save(&mut self) {
        if let Err(e) = self.enter_overview().await {
            tracing::warn!(error = %e, "saved, but the overview could not subscribe");
        }
    }

    async fn subscribe_overview(&mut self) -> Result<()> {
        let day = self
            .ledger
            .list(self.selected_date)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to subscribe to entries"))?;
        let goals = self
            .goals
            .subscribe()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to subscribe to goals"))?;
        self.feeds = Some(OverviewFeeds { day, goals });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Local;

    use super::*;
    use crate::error::{GatewayError, ValidationError};
    use crate::gateway::{Subscription, SyncGateway};
    use crate::ledger::tests::FailingGateway;
    use crate::local::LocalGateway;
    use crate::models::{NewFoodEntry, UserId};

    /// Local storage whose `subscribe_foods` fails on the listed calls (1-based).
    struct FlakySubscribeGateway {
        inner: LocalGateway,
        subscribes: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl FlakySubscribeGateway {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                inner: LocalGateway::in_memory().unwrap(),
                subscribes: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl SyncGateway for FlakySubscribeGateway {
        async fn subscribe_goals(
            &self,
            user: &UserId,
        ) -> Result<Subscription<Option<GoalSettings>>, GatewayError> {
            self.inner.subscribe_goals(user).await
        }

        async fn subscribe_foods(
            &self,
            user: &UserId,
            date: NaiveDate,
        ) -> Result<Subscription<Vec<FoodEntry>>, GatewayError> {
            let call = self.subscribes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(GatewayError::Read(anyhow::anyhow!("connection reset")));
            }
            self.inner.subscribe_foods(user, date).await
        }

        async fn create_food(
            &self,
            user: &UserId,
            entry: NewFoodEntry,
        ) -> Result<String, GatewayError> {
            self.inner.create_food(user, entry).await
        }

        async fn delete_food(&self, user: &UserId, id: &str) -> Result<(), GatewayError> {
            self.inner.delete_food(user, id).await
        }

        async fn read_goals(&self, user: &UserId) -> Result<Option<GoalSettings>, GatewayError> {
            self.inner.read_goals(user).await
        }

        async fn write_goals(
            &self,
            user: &UserId,
            goals: &GoalSettings,
        ) -> Result<(), GatewayError> {
            self.inner.write_goals(user, goals).await
        }
    }

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn local_view() -> (Arc<LocalGateway>, ClientContext, ViewController) {
        let gateway = Arc::new(LocalGateway::in_memory().unwrap());
        let ctx = ClientContext::for_user(UserId::new("view-user"), gateway.clone());
        let view = ViewController::start(ctx.clone(), jan(1)).await.unwrap();
        (gateway, ctx, view)
    }

    #[tokio::test]
    async fn test_start_on_overview() {
        let (gateway, _ctx, view) = local_view().await;
        assert_eq!(view.screen(), Screen::Overview);
        assert_eq!(gateway.active_listeners(), 2);

        let summary = view.overview().unwrap();
        assert_eq!(summary.date, jan(1));
        assert!(summary.entries.is_empty());
        assert_eq!(summary.goals, GoalSettings::default());
    }

    #[tokio::test]
    async fn test_add_form_defaults() {
        let form = AddEntryForm::default();
        assert_eq!(form.weight_g, 100.0);
        assert_eq!(form.density, MacroDensity::new(20.0, 5.0, 0.0));
        assert!((form.preview_calories() - 125.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_add_entry_flow() {
        let (gateway, _ctx, mut view) = local_view().await;
        view.open_add().unwrap();
        assert_eq!(view.screen(), Screen::AddEntry);
        assert_eq!(gateway.active_listeners(), 0);
        assert!(view.overview().is_none());

        let form = view.add_form_mut();
        form.name = "Chicken Breast".to_string();
        form.weight_g = 150.0;
        form.density = MacroDensity::new(31.0, 3.6, 0.0);
        let entry = view.save_entry().await.unwrap();

        assert_eq!(view.screen(), Screen::Overview);
        assert_eq!(gateway.active_listeners(), 2);
        let summary = view.overview().unwrap();
        assert_eq!(summary.entries, vec![entry]);
        assert!((summary.totals.calories - 234.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_save_entry_validation_stays() {
        let (_gateway, _ctx, mut view) = local_view().await;
        view.open_add().unwrap();
        let err = view.save_entry().await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyName)));
        assert_eq!(view.screen(), Screen::AddEntry);
    }

    #[tokio::test]
    async fn test_save_entry_write_failure_stays() {
        let gateway = Arc::new(FailingGateway::default());
        let ctx = ClientContext::for_user(UserId::new("view-user"), gateway.clone());
        let mut view = ViewController::start(ctx, jan(1)).await.unwrap();

        view.open_add().unwrap();
        view.add_form_mut().name = "rice".to_string();
        let err = view.save_entry().await.unwrap_err();
        assert!(matches!(err, Error::Gateway(GatewayError::Write(_))));
        assert_eq!(view.screen(), Screen::AddEntry);
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_is_returned() {
        let gateway = Arc::new(FailingGateway::default());
        let ctx = ClientContext::for_user(UserId::new("view-user"), gateway);
        let mut view = ViewController::start(ctx, jan(1)).await.unwrap();
        let err = view.delete_entry("missing").await.unwrap_err();
        assert!(matches!(err, Error::Gateway(GatewayError::Write(_))));
        assert_eq!(view.screen(), Screen::Overview);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let (_gateway, _ctx, mut view) = local_view().await;

        let err = view.save_entry().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: Screen::Overview,
                to: Screen::Overview
            }
        ));
        assert!(view.back().await.is_err());
        assert!(view.save_settings().await.is_err());

        view.open_add().unwrap();
        assert!(view.open_add().is_err());
        let err = view.open_settings().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: Screen::AddEntry,
                to: Screen::Settings
            }
        ));
        assert!(view.delete_entry("x").await.is_err());
        assert_eq!(view.screen(), Screen::AddEntry);

        view.back().await.unwrap();
        assert_eq!(view.screen(), Screen::Overview);
    }

    #[tokio::test]
    async fn test_settings_flow() {
        let (gateway, ctx, mut view) = local_view().await;
        GoalStore::new(ctx)
            .save(&GoalSettings::new(150.0, 60.0, 200.0).unwrap())
            .await
            .unwrap();

        view.open_settings().await.unwrap();
        assert_eq!(view.screen(), Screen::Settings);
        assert_eq!(gateway.active_listeners(), 0);
        assert_eq!(view.settings_form().proteins(), 150.0);

        view.settings_form_mut().set_carbs(250.0).unwrap();
        view.save_settings().await.unwrap();
        assert_eq!(view.screen(), Screen::Overview);

        let goals = view.overview().unwrap().goals;
        assert_eq!(goals.carbs(), 250.0);
        assert!((goals.calories() - (600.0 + 540.0 + 1000.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_select_date_releases_old_feed() {
        let (gateway, ctx, mut view) = local_view().await;
        view.select_date(jan(2)).await.unwrap();
        assert_eq!(view.selected_date(), jan(2));
        assert_eq!(gateway.active_listeners(), 2);

        // Writes to the old date no longer reach the overview
        let ledger = DailyLedger::new(ctx);
        ledger
            .add(jan(1), "bread", 50.0, MacroDensity::new(9.0, 3.2, 49.0))
            .await
            .unwrap();
        assert!(view.overview().unwrap().entries.is_empty());

        let added = ledger
            .add(jan(2), "bread", 50.0, MacroDensity::new(9.0, 3.2, 49.0))
            .await
            .unwrap();
        assert_eq!(view.overview().unwrap().entries, vec![added]);
    }

    #[tokio::test]
    async fn test_changed_follows_other_writers() {
        let (_gateway, ctx, mut view) = local_view().await;
        let first = view.changed().await.unwrap();
        assert!(first.entries.is_empty());

        let added = DailyLedger::new(ctx)
            .add(jan(1), "banana", 120.0, MacroDensity::new(1.1, 0.3, 22.8))
            .await
            .unwrap();
        let summary = view.changed().await.unwrap();
        assert_eq!(summary.entries, vec![added]);

        view.open_add().unwrap();
        assert!(view.changed().await.is_none());
    }

    #[tokio::test]
    async fn test_repeat_and_delete() {
        let (_gateway, ctx, mut view) = local_view().await;
        let ledger = DailyLedger::new(ctx);
        let entry = ledger
            .add(jan(1), "yogurt", 150.0, MacroDensity::new(10.0, 2.0, 4.0))
            .await
            .unwrap();

        let copy = view.repeat_entry(&entry.id).await.unwrap();
        assert_eq!(copy.date, Local::now().date_naive());
        assert_ne!(copy.id, entry.id);

        let err = view.repeat_entry("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        view.delete_entry(&entry.id).await.unwrap();
        assert!(view.overview().unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_saved_entry_survives_failed_resubscribe() {
        let gateway = Arc::new(FlakySubscribeGateway::new(vec![2]));
        let ctx = ClientContext::for_user(UserId::new("view-user"), gateway.clone());
        let mut view = ViewController::start(ctx.clone(), jan(1)).await.unwrap();

        view.open_add().unwrap();
        view.add_form_mut().name = "lentils".to_string();
        let entry = view.save_entry().await.unwrap();

        assert_eq!(view.screen(), Screen::Overview);
        assert!(view.overview().is_none());
        assert_eq!(
            DailyLedger::new(ctx).entries(jan(1)).await.unwrap(),
            vec![entry.clone()]
        );

        view.select_date(jan(1)).await.unwrap();
        assert_eq!(view.overview().unwrap().entries, vec![entry]);
    }

    #[tokio::test]
    async fn test_refresh_after_failed_settings_resubscribe() {
        let gateway = Arc::new(FlakySubscribeGateway::new(vec![2]));
        let ctx = ClientContext::for_user(UserId::new("view-user"), gateway);
        let mut view = ViewController::start(ctx, jan(1)).await.unwrap();

        view.open_settings().await.unwrap();
        view.settings_form_mut().set_fats(70.0).unwrap();
        view.save_settings().await.unwrap();
        assert_eq!(view.screen(), Screen::Overview);
        assert!(view.overview().is_none());

        view.refresh().await.unwrap();
        assert_eq!(view.overview().unwrap().goals.fats(), 70.0);
    }
}
