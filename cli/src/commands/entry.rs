use anyhow::Result;
use std::process;

use macrolog_core::Error;
use macrolog_core::context::ClientContext;
use macrolog_core::ledger::DailyLedger;
use macrolog_core::nutrition::MacroDensity;

use super::helpers::{json_error, parse_date, parse_date_str, parse_weight};

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_add(
    ctx: &ClientContext,
    name: &str,
    weight: &str,
    protein: f64,
    fat: f64,
    carbs: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let weight_g = parse_weight(weight)?;
    let density = MacroDensity::new(protein, fat, carbs);

    let entry = match DailyLedger::new(ctx.clone())
        .add(date, name, weight_g, density)
        .await
    {
        Ok(entry) => entry,
        Err(Error::Validation(e)) => {
            if json {
                println!("{}", json_error(&e.to_string()));
            } else {
                eprintln!("{e}");
            }
            process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {} ({:.0}g) on {}: {:.0} kcal | P:{:.1}g F:{:.1}g C:{:.1}g [{}]",
            entry.name,
            entry.weight_g,
            entry.date,
            entry.calories,
            entry.proteins,
            entry.fats,
            entry.carbs,
            entry.id
        );
    }
    Ok(())
}

/// Deleting an id that does not exist is not an error.
pub(crate) async fn cmd_delete(ctx: &ClientContext, id: &str, json: bool) -> Result<()> {
    DailyLedger::new(ctx.clone()).remove(id).await?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted entry {id}");
    }
    Ok(())
}

pub(crate) async fn cmd_repeat(ctx: &ClientContext, date: &str, id: &str, json: bool) -> Result<()> {
    let date = parse_date_str(date)?;
    let ledger = DailyLedger::new(ctx.clone());

    let Some(entry) = ledger.entry(date, id).await? else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found on {date}")));
        } else {
            eprintln!("Entry {id} not found on {date}");
        }
        process::exit(2);
    };

    let copy = ledger.duplicate(&entry).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&copy)?);
    } else {
        println!(
            "Repeated {} ({:.0}g, {:.0} kcal) on {} [{}]",
            copy.name, copy.weight_g, copy.calories, copy.date, copy.id
        );
    }
    Ok(())
}
