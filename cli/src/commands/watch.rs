use anyhow::{Context, Result};

use macrolog_core::context::ClientContext;
use macrolog_core::view::ViewController;

use super::helpers::{parse_date, render_summary};

/// Reprint the day on every pushed change until Ctrl-C. With `--json` each
/// snapshot is one line.
pub(crate) async fn cmd_watch(ctx: &ClientContext, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let mut view = ViewController::start(ctx.clone(), date).await?;
    if !json {
        eprintln!("Watching {date}. Press Ctrl-C to stop.");
    }

    loop {
        tokio::select! {
            summary = view.changed() => {
                let Some(summary) = summary else {
                    tracing::warn!(%date, "feed closed");
                    break;
                };
                if json {
                    println!("{}", serde_json::to_string(&summary)?);
                } else {
                    println!("{}\n", render_summary(&summary));
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }
    Ok(())
}
