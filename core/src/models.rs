use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::nutrition::{self, MacroDensity, Macros};

pub const DEFAULT_PROTEINS_G: f64 = 200.0;
pub const DEFAULT_FATS_G: f64 = 80.0;
pub const DEFAULT_CARBS_G: f64 = 300.0;

/// Upper bound for a single macro per 100 g of food.
pub const MAX_DENSITY_PER_100G: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    pub weight_g: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl FoodEntry {
    #[must_use]
    pub fn from_new(id: String, entry: NewFoodEntry) -> Self {
        Self {
            id,
            name: entry.name,
            weight_g: entry.weight_g,
            proteins: entry.proteins,
            fats: entry.fats,
            carbs: entry.carbs,
            calories: entry.calories,
            date: entry.date,
            created_at: entry.created_at,
        }
    }
}

/// A food entry that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFoodEntry {
    pub name: String,
    pub weight_g: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl NewFoodEntry {
    /// Build an entry from already scaled macros. Calories are derived here so
    /// every persisted entry carries `proteins*4 + fats*9 + carbs*4`.
    #[must_use]
    pub fn from_macros(
        name: String,
        weight_g: f64,
        macros: Macros,
        date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            weight_g,
            proteins: macros.proteins,
            fats: macros.fats,
            carbs: macros.carbs,
            calories: macros.calories(),
            date,
            created_at,
        }
    }
}

/// Trim and lowercase a food name, rejecting names that end up empty.
pub fn normalize_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_lowercase())
}

pub fn validate_weight(weight_g: f64) -> Result<(), ValidationError> {
    if !weight_g.is_finite() || weight_g <= 0.0 {
        return Err(ValidationError::NonPositiveWeight(weight_g));
    }
    Ok(())
}

pub fn validate_density(density: &MacroDensity) -> Result<(), ValidationError> {
    for (field, value) in [
        ("Proteins", density.proteins),
        ("Fats", density.fats),
        ("Carbs", density.carbs),
    ] {
        if !value.is_finite() || !(0.0..=MAX_DENSITY_PER_100G).contains(&value) {
            return Err(ValidationError::DensityOutOfRange { field, value });
        }
    }
    Ok(())
}

fn validate_goal(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidGoal { field, value });
    }
    Ok(())
}

/// Daily macro targets. The calorie target has no storage of its own: it is
/// derived from the macros on every read and whatever calorie figure arrives
/// with a deserialized document is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "GoalRecord", into = "GoalRecord")]
pub struct GoalSettings {
    proteins: f64,
    fats: f64,
    carbs: f64,
}

impl Default for GoalSettings {
    fn default() -> Self {
        Self {
            proteins: DEFAULT_PROTEINS_G,
            fats: DEFAULT_FATS_G,
            carbs: DEFAULT_CARBS_G,
        }
    }
}

impl GoalSettings {
    pub fn new(proteins: f64, fats: f64, carbs: f64) -> Result<Self, ValidationError> {
        validate_goal("Proteins", proteins)?;
        validate_goal("Fats", fats)?;
        validate_goal("Carbs", carbs)?;
        Ok(Self {
            proteins,
            fats,
            carbs,
        })
    }

    #[must_use]
    pub fn proteins(&self) -> f64 {
        self.proteins
    }

    #[must_use]
    pub fn fats(&self) -> f64 {
        self.fats
    }

    #[must_use]
    pub fn carbs(&self) -> f64 {
        self.carbs
    }

    #[must_use]
    pub fn calories(&self) -> f64 {
        nutrition::calories(self.proteins, self.fats, self.carbs)
    }

    pub fn set_proteins(&mut self, grams: f64) -> Result<(), ValidationError> {
        validate_goal("Proteins", grams)?;
        self.proteins = grams;
        Ok(())
    }

    pub fn set_fats(&mut self, grams: f64) -> Result<(), ValidationError> {
        validate_goal("Fats", grams)?;
        self.fats = grams;
        Ok(())
    }

    pub fn set_carbs(&mut self, grams: f64) -> Result<(), ValidationError> {
        validate_goal("Carbs", grams)?;
        self.carbs = grams;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct GoalRecord {
    proteins: f64,
    fats: f64,
    carbs: f64,
    #[serde(default)]
    calories: f64,
}

impl From<GoalRecord> for GoalSettings {
    fn from(record: GoalRecord) -> Self {
        Self {
            proteins: record.proteins,
            fats: record.fats,
            carbs: record.carbs,
        }
    }
}

impl From<GoalSettings> for GoalRecord {
    fn from(goals: GoalSettings) -> Self {
        Self {
            proteins: goals.proteins,
            fats: goals.fats,
            carbs: goals.carbs,
            calories: goals.calories(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
}

impl AddAssign<&FoodEntry> for Totals {
    fn add_assign(&mut self, entry: &FoodEntry) {
        self.proteins += entry.proteins;
        self.fats += entry.fats;
        self.carbs += entry.carbs;
        self.calories += entry.calories;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub achieved: f64,
    pub target: f64,
    pub percent: f64,
}

impl Progress {
    #[must_use]
    pub fn new(achieved: f64, target: f64) -> Self {
        let percent = if target > 0.0 {
            (achieved / target * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            achieved,
            target,
            percent,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.target - self.achieved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub calories: Progress,
    pub proteins: Progress,
    pub fats: Progress,
    pub carbs: Progress,
}

impl GoalProgress {
    #[must_use]
    pub fn new(totals: &Totals, goals: &GoalSettings) -> Self {
        Self {
            calories: Progress::new(totals.calories, goals.calories()),
            proteins: Progress::new(totals.proteins, goals.proteins()),
            fats: Progress::new(totals.fats, goals.fats()),
            carbs: Progress::new(totals.carbs, goals.carbs()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub entries: Vec<FoodEntry>,
    pub totals: Totals,
    pub goals: GoalSettings,
    pub progress: GoalProgress,
}
