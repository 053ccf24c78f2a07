mod entry;
mod goals;
mod helpers;
mod summary;
mod watch;

use anyhow::Result;
use chrono::NaiveDate;

use macrolog_core::context::ClientContext;
use macrolog_core::goals::GoalStore;
use macrolog_core::ledger::DailyLedger;
use macrolog_core::models::DailySummary;

pub(crate) use entry::{cmd_add, cmd_delete, cmd_repeat};
pub(crate) use goals::{cmd_goals_set, cmd_goals_show};
pub(crate) use summary::{cmd_history, cmd_show};
pub(crate) use watch::cmd_watch;

/// One-shot summary of a day: the entries plus the goals they are measured against.
pub(crate) async fn load_summary(ctx: &ClientContext, date: NaiveDate) -> Result<DailySummary> {
    let goals = GoalStore::new(ctx.clone()).load().await?;
    Ok(DailyLedger::new(ctx.clone()).summary(date, goals).await?)
}
