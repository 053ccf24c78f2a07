use chrono::{DateTime, Local, NaiveDate, Utc};
use futures_util::{Stream, StreamExt};

use crate::context::ClientContext;
use crate::error::{GatewayError, Result};
use crate::gateway::Subscription;
use crate::models::{
    DailySummary, FoodEntry, GoalProgress, GoalSettings, NewFoodEntry, Totals, normalize_name,
    validate_density, validate_weight,
};
use crate::nutrition::MacroDensity;

/// Sum the macros and calories of a day's entries.
#[must_use]
pub fn aggregate(entries: &[FoodEntry]) -> Totals {
    entries.iter().fold(Totals::default(), |mut totals, entry| {
        totals += entry;
        totals
    })
}

/// Newest first; ties keep their incoming order.
fn sort_newest_first(entries: &mut [FoodEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[must_use]
pub fn summarize(date: NaiveDate, mut entries: Vec<FoodEntry>, goals: GoalSettings) -> DailySummary {
    sort_newest_first(&mut entries);
    let totals = aggregate(&entries);
    DailySummary {
        date,
        progress: GoalProgress::new(&totals, &goals),
        entries,
        totals,
        goals,
    }
}

/// Live view of one day's entries. Releasing it stops updates for that day.
pub struct DayFeed {
    date: NaiveDate,
    inner: Subscription<Vec<FoodEntry>>,
}

impl DayFeed {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn current(&self) -> Vec<FoodEntry> {
        let mut entries = self.inner.current();
        sort_newest_first(&mut entries);
        entries
    }

    pub async fn next(&mut self) -> Option<Vec<FoodEntry>> {
        let mut entries = self.inner.next().await?;
        sort_newest_first(&mut entries);
        Some(entries)
    }

    pub fn unsubscribe(self) {
        self.inner.unsubscribe();
    }

    /// Every snapshot as a stream, newest first. Dropping the stream releases the feed.
    pub fn into_stream(self) -> impl Stream<Item = Vec<FoodEntry>> + Send + 'static {
        self.inner.into_stream().map(|mut entries| {
            sort_newest_first(&mut entries);
            entries
        })
    }
}

#[derive(Clone)]
pub struct DailyLedger {
    ctx: ClientContext,
}

impl DailyLedger {
    #[must_use]
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    pub async fn list(&self, date: NaiveDate) -> Result<DayFeed, GatewayError> {
        let inner = self
            .ctx
            .gateway()
            .subscribe_foods(self.ctx.user(), date)
            .await?;
        Ok(DayFeed { date, inner })
    }

    /// One-shot snapshot of a day, newest first.
    pub async fn entries(&self, date: NaiveDate) -> Result<Vec<FoodEntry>, GatewayError> {
        let feed = self.list(date).await?;
        let entries = feed.current();
        feed.unsubscribe();
        Ok(entries)
    }

    pub async fn entry(
        &self,
        date: NaiveDate,
        id: &str,
    ) -> Result<Option<FoodEntry>, GatewayError> {
        Ok(self.entries(date).await?.into_iter().find(|e| e.id == id))
    }

    /// Snapshot of a day measured against `goals`.
    pub async fn summary(
        &self,
        date: NaiveDate,
        goals: GoalSettings,
    ) -> Result<DailySummary, GatewayError> {
        Ok(summarize(date, self.entries(date).await?, goals))
    }

    pub async fn add(
        &self,
        date: NaiveDate,
        name: &str,
        weight_g: f64,
        density: MacroDensity,
    ) -> Result<FoodEntry> {
        let name = normalize_name(name)?;
        validate_weight(weight_g)?;
        validate_density(&density)?;

        let macros = density.scale(weight_g);
        let entry = NewFoodEntry::from_macros(name, weight_g, macros, date, Utc::now());
        let id = self
            .ctx
            .gateway()
            .create_food(self.ctx.user(), entry.clone())
            .await?;
        tracing::info!(%id, %date, name = %entry.name, calories = entry.calories, "added food entry");
        Ok(FoodEntry::from_new(id, entry))
    }

    pub async fn remove(&self, id: &str) -> Result<(), GatewayError> {
        self.ctx.gateway().delete_food(self.ctx.user(), id).await?;
        tracing::info!(%id, "removed food entry");
        Ok(())
    }

    /// Copy an entry into today.
    pub async fn duplicate(&self, entry: &FoodEntry) -> Result<FoodEntry, GatewayError> {
        self.duplicate_on(entry, Local::now().date_naive(), Utc::now())
            .await
    }

    pub async fn duplicate_on(
        &self,
        entry: &FoodEntry,
        today: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Result<FoodEntry, GatewayError> {
        let copy = NewFoodEntry {
            name: entry.name.clone(),
            weight_g: entry.weight_g,
            proteins: entry.proteins,
            fats: entry.fats,
            carbs: entry.carbs,
            calories: entry.calories,
            date: today,
            created_at,
        };
        let id = self
            .ctx
            .gateway()
            .create_food(self.ctx.user(), copy.clone())
            .await?;
        tracing::info!(%id, from = %entry.id, date = %today, "duplicated food entry");
        Ok(FoodEntry::from_new(id, copy))
    }
}
