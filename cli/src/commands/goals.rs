use anyhow::{Result, bail};

use macrolog_core::context::ClientContext;
use macrolog_core::goals::GoalStore;
use macrolog_core::models::GoalSettings;

fn print_goals(goals: &GoalSettings) {
    println!("Daily goals:");
    println!("  Protein:  {:.0}g", goals.proteins());
    println!("  Fat:      {:.0}g", goals.fats());
    println!("  Carbs:    {:.0}g", goals.carbs());
    println!("  Calories: {:.0} kcal", goals.calories());
}

pub(crate) async fn cmd_goals_show(ctx: &ClientContext, json: bool) -> Result<()> {
    let goals = GoalStore::new(ctx.clone()).load().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        print_goals(&goals);
    }
    Ok(())
}

/// Only the given macros change; calories follow from the result.
pub(crate) async fn cmd_goals_set(
    ctx: &ClientContext,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs: Option<f64>,
    json: bool,
) -> Result<()> {
    if protein.is_none() && fat.is_none() && carbs.is_none() {
        bail!("Nothing to set. Provide at least one of --protein, --fat or --carbs");
    }

    let store = GoalStore::new(ctx.clone());
    let mut goals = store.load().await?;
    if let Some(grams) = protein {
        goals.set_proteins(grams)?;
    }
    if let Some(grams) = fat {
        goals.set_fats(grams)?;
    }
    if let Some(grams) = carbs {
        goals.set_carbs(grams)?;
    }
    store.save(&goals).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        print_goals(&goals);
    }
    Ok(())
}
