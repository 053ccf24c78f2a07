use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use macrolog_core::context::ClientContext;

use super::helpers::{no_neg_zero, parse_date, render_summary};
use super::load_summary;

pub(crate) async fn cmd_show(ctx: &ClientContext, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = load_summary(ctx, date).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", render_summary(&summary));
    }
    Ok(())
}

pub(crate) async fn cmd_history(ctx: &ClientContext, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled, Serialize)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Goal")]
        goal: String,
    }

    let today = Local::now().date_naive();
    let mut summaries = Vec::new();
    for i in 0..days {
        let date = today - chrono::Duration::days(i64::from(i));
        summaries.push(load_summary(ctx, date).await?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.iter().all(|s| s.entries.is_empty()) {
        eprintln!("No entries in the last {days} days");
        return Ok(());
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| {
            let t = &s.totals;
            HistoryRow {
                date: s.date.to_string(),
                entries: s.entries.len(),
                calories: format!("{:.0}", no_neg_zero(t.calories)),
                protein: format!("{:.0}g", no_neg_zero(t.proteins)),
                fat: format!("{:.0}g", no_neg_zero(t.fats)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                goal: format!("{:.0}%", s.progress.calories.percent),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
