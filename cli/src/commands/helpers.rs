use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use macrolog_core::models::DailySummary;

/// Parse a weight like "150" or "150g" into grams. Range checks are left to
/// the ledger so they report as validation errors.
pub(crate) fn parse_weight(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches('g').trim();
    trimmed
        .parse()
        .with_context(|| format!("Invalid weight: '{s}'. Use a number like '150' or '150g'"))
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => parse_date_str(&s),
    }
}

pub(crate) fn parse_date_str(s: &str) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match s {
        "today" => Ok(today),
        "yesterday" => Ok(today - chrono::Duration::days(1)),
        "tomorrow" => Ok(today + chrono::Duration::days(1)),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Human readable day view: entries, then totals against goals.
pub(crate) fn render_summary(summary: &DailySummary) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let date = summary.date;
    let _ = writeln!(out, "=== {date} ===\n");

    if summary.entries.is_empty() {
        let _ = writeln!(out, "  (no entries)\n");
    }
    for e in &summary.entries {
        let name = truncate(&e.name, 30);
        let _ = writeln!(
            out,
            "  [{}] {name} {:.0}g  {:.0} kcal | P:{:.1}g F:{:.1}g C:{:.1}g",
            e.id, e.weight_g, e.calories, e.proteins, e.fats, e.carbs
        );
    }
    if !summary.entries.is_empty() {
        out.push('\n');
    }

    let t = &summary.totals;
    let g = &summary.goals;
    let p = &summary.progress;
    let _ = writeln!(
        out,
        "  TOTAL: {:.0} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
        no_neg_zero(t.calories),
        no_neg_zero(t.proteins),
        no_neg_zero(t.fats),
        no_neg_zero(t.carbs)
    );
    let _ = writeln!(
        out,
        "  TARGET: {:.0} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
        g.calories(),
        g.proteins(),
        g.fats(),
        g.carbs()
    );
    let _ = writeln!(
        out,
        "  REMAINING: {:.0} kcal | P:{:.0}g F:{:.0}g C:{:.0}g",
        no_neg_zero(p.calories.remaining()),
        no_neg_zero(p.proteins.remaining()),
        no_neg_zero(p.fats.remaining()),
        no_neg_zero(p.carbs.remaining())
    );
    let _ = write!(
        out,
        "  PROGRESS: {:.0}% kcal | P:{:.0}% F:{:.0}% C:{:.0}%",
        p.calories.percent, p.proteins.percent, p.fats.percent, p.carbs.percent
    );
    out
}
