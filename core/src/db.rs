use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::models::{FoodEntry, GoalSettings, NewFoodEntry, UserId};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS food_entries (
                    id TEXT PRIMARY KEY NOT NULL,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    weight_g REAL NOT NULL CHECK (weight_g > 0),
                    proteins REAL NOT NULL,
                    fats REAL NOT NULL,
                    carbs REAL NOT NULL,
                    calories REAL NOT NULL,
                    date TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_food_entries_user_date
                    ON food_entries(user_id, date);

                CREATE TABLE IF NOT EXISTS goal_settings (
                    user_id TEXT PRIMARY KEY NOT NULL,
                    proteins REAL NOT NULL,
                    fats REAL NOT NULL,
                    carbs REAL NOT NULL,
                    calories REAL NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_column<T, E>(
        idx: usize,
        raw: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> rusqlite::Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        parse(raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    // Expects columns:
    // 0: id, 1: name, 2: weight_g, 3: proteins, 4: fats, 5: carbs,
    // 6: calories, 7: date, 8: created_at
    fn food_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
        let date: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        Ok(FoodEntry {
            id: row.get(0)?,
            name: row.get(1)?,
            weight_g: row.get(2)?,
            proteins: row.get(3)?,
            fats: row.get(4)?,
            carbs: row.get(5)?,
            calories: row.get(6)?,
            date: Self::parse_column(7, &date, |s| NaiveDate::parse_from_str(s, DATE_FORMAT))?,
            created_at: Self::parse_column(8, &created_at, |s| {
                DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
            })?,
        })
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        // Fixed width so that text ordering matches time ordering
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    // --- Food entries ---

    pub fn insert_food_entry(&self, user: &UserId, entry: &NewFoodEntry) -> Result<FoodEntry> {
        let id = Uuid::new_v4().to_string();
        let date_str = entry.date.format(DATE_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO food_entries (id, user_id, name, weight_g, proteins, fats, carbs, calories, date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                user.as_str(),
                entry.name,
                entry.weight_g,
                entry.proteins,
                entry.fats,
                entry.carbs,
                entry.calories,
                date_str,
                Self::format_timestamp(&entry.created_at),
            ],
        )?;
        self.get_food_entry(user, &id)?
            .context("Food entry vanished after insert")
    }

    pub fn get_food_entry(&self, user: &UserId, id: &str) -> Result<Option<FoodEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, weight_g, proteins, fats, carbs, calories, date, created_at
             FROM food_entries
             WHERE user_id = ?1 AND id = ?2",
        )?;
        let mut rows = stmt.query(params![user.as_str(), id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Returns the date the entry belonged to, or `None` when nothing was deleted.
    pub fn delete_food_entry(&self, user: &UserId, id: &str) -> Result<Option<NaiveDate>> {
        let Some(entry) = self.get_food_entry(user, id)? else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM food_entries WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), id],
        )?;
        Ok(Some(entry.date))
    }

    /// Entries for one day, newest first.
    pub fn get_entries_for_date(&self, user: &UserId, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, name, weight_g, proteins, fats, carbs, calories, date, created_at
             FROM food_entries
             WHERE user_id = ?1 AND date = ?2
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map(params![user.as_str(), date_str], Self::food_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // --- Goals ---

    pub fn get_goals(&self, user: &UserId) -> Result<Option<GoalSettings>> {
        let mut stmt = self
            .conn
            .prepare("SELECT proteins, fats, carbs FROM goal_settings WHERE user_id = ?1")?;
        let mut rows = stmt.query(params![user.as_str()])?;
        if let Some(row) = rows.next()? {
            // The stored calorie column is for other readers; it is re-derived here.
            let goals = GoalSettings::new(row.get(0)?, row.get(1)?, row.get(2)?)
                .context("Stored goals are invalid")?;
            Ok(Some(goals))
        } else {
            Ok(None)
        }
    }

    pub fn put_goals(&self, user: &UserId, goals: &GoalSettings) -> Result<()> {
        let now = Self::format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO goal_settings (user_id, proteins, fats, carbs, calories, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                proteins = excluded.proteins,
                fats = excluded.fats,
                carbs = excluded.carbs,
                calories = excluded.calories,
                updated_at = excluded.updated_at",
            params![
                user.as_str(),
                goals.proteins(),
                goals.fats(),
                goals.carbs(),
                goals.calories(),
                now,
            ],
        )?;
        Ok(())
    }

    // --- Change detection ---

    /// Changes whenever another connection commits to the database file.
    pub fn data_version(&self) -> Result<i64> {
        let version = self
            .conn
            .pragma_query_value(None, "data_version", |row| row.get(0))?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> UserId {
        UserId::new("user-1")
    }

    fn sample_entry(date: NaiveDate, created_at: DateTime<Utc>) -> NewFoodEntry {
        NewFoodEntry {
            name: "chicken breast".to_string(),
            weight_g: 150.0,
            proteins: 46.5,
            fats: 5.4,
            carbs: 0.0,
            calories: 234.6,
            date,
            created_at,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_get_food_entry() {
        let db = Database::open_in_memory().unwrap();
        let entry = db.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();

        assert!(!entry.id.is_empty());
        assert_eq!(entry.name, "chicken breast");
        assert_eq!(entry.weight_g, 150.0);
        assert_eq!(entry.date, day(1));
        assert_eq!(entry.created_at, at(8));
        assert!((entry.calories - 234.6).abs() < 1e-9);

        let fetched = db.get_food_entry(&user(), &entry.id).unwrap().unwrap();
        assert_eq!(fetched, entry);
    }

    #[test]
    fn test_insert_generates_distinct_ids() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();
        let b = db.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_entries_for_date_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let first = db.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();
        let third = db.insert_food_entry(&user(), &sample_entry(day(1), at(20))).unwrap();
        let second = db.insert_food_entry(&user(), &sample_entry(day(1), at(12))).unwrap();
        db.insert_food_entry(&user(), &sample_entry(day(2), at(9))).unwrap();

        let entries = db.get_entries_for_date(&user(), day(1)).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

        assert_eq!(db.get_entries_for_date(&user(), day(2)).unwrap().len(), 1);
        assert!(db.get_entries_for_date(&user(), day(3)).unwrap().is_empty());
    }

    #[test]
    fn test_entries_scoped_per_user() {
        let db = Database::open_in_memory().unwrap();
        let other = UserId::new("user-2");
        let entry = db.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();

        assert!(db.get_entries_for_date(&other, day(1)).unwrap().is_empty());
        assert!(db.get_food_entry(&other, &entry.id).unwrap().is_none());
        // Another user cannot delete it either
        assert!(db.delete_food_entry(&other, &entry.id).unwrap().is_none());
        assert_eq!(db.get_entries_for_date(&user(), day(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_food_entry() {
        let db = Database::open_in_memory().unwrap();
        let entry = db.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();

        assert_eq!(db.delete_food_entry(&user(), &entry.id).unwrap(), Some(day(1)));
        // Deleting again finds nothing
        assert_eq!(db.delete_food_entry(&user(), &entry.id).unwrap(), None);
        assert!(db.get_entries_for_date(&user(), day(1)).unwrap().is_empty());
    }

    #[test]
    fn test_goals_absent_then_put() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_goals(&user()).unwrap().is_none());

        let goals = GoalSettings::new(150.0, 60.0, 250.0).unwrap();
        db.put_goals(&user(), &goals).unwrap();
        assert_eq!(db.get_goals(&user()).unwrap(), Some(goals));

        // Full overwrite
        let goals = GoalSettings::new(180.0, 70.0, 200.0).unwrap();
        db.put_goals(&user(), &goals).unwrap();
        let stored = db.get_goals(&user()).unwrap().unwrap();
        assert_eq!(stored, goals);
        assert!((stored.calories() - (720.0 + 630.0 + 800.0)).abs() < f64::EPSILON);

        assert!(db.get_goals(&UserId::new("someone-else")).unwrap().is_none());
    }

    #[test]
    fn test_stored_calories_column_matches_macros() {
        let db = Database::open_in_memory().unwrap();
        db.put_goals(&user(), &GoalSettings::default()).unwrap();
        let calories: f64 = db
            .conn
            .query_row(
                "SELECT calories FROM goal_settings WHERE user_id = ?1",
                params![user().as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert!((calories - 2720.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_goals_updated_at_is_utc_timestamp() {
        let db = Database::open_in_memory().unwrap();
        db.put_goals(&user(), &GoalSettings::default()).unwrap();
        let updated_at: String = db
            .conn
            .query_row(
                "SELECT updated_at FROM goal_settings WHERE user_id = ?1",
                params![user().as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert!(updated_at.ends_with('Z'));
        assert_eq!(updated_at.len(), "2024-01-01T00:00:00.000000000Z".len());
        assert!(DateTime::parse_from_rfc3339(&updated_at).is_ok());
    }

    #[test]
    fn test_migration_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_data_version_tracks_other_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macrolog.db");
        let reader = Database::open(&path).unwrap();
        let writer = Database::open(&path).unwrap();

        let before = reader.data_version().unwrap();
        writer.insert_food_entry(&user(), &sample_entry(day(1), at(8))).unwrap();
        let after = reader.data_version().unwrap();
        assert_ne!(before, after);

        // Own writes do not move the reader's own version
        let own_before = writer.data_version().unwrap();
        writer.insert_food_entry(&user(), &sample_entry(day(1), at(9))).unwrap();
        assert_eq!(writer.data_version().unwrap(), own_before);
    }
}
