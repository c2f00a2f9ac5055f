use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult, map_unique};
use crate::models::{DATE_FORMAT, Food, FoodWithLastMeal, Meal, NewFood, NewMeal, days_ago};

/// Schema version stored in `PRAGMA user_version` once fully migrated.
///
/// Version 1 is the original layout with `foods.last_had`; version 2 moves
/// meal history into `meals` with a foreign key to `foods`.
pub const SCHEMA_VERSION: i64 = 2;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let mut db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Bring the schema up to [`SCHEMA_VERSION`].
    ///
    /// Core tables are created in their own transaction and any failure there
    /// is returned. Converting legacy data runs in a second transaction; if it
    /// fails it is rolled back, logged, and retried on the next open.
    fn migrate(&mut self) -> Result<()> {
        // Must be set outside a transaction to take effect.
        self.conn
            .pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        let version = self.schema_version()?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        {
            let tx = self.conn.transaction()?;
            create_core_tables(&tx).context("Failed to create core tables")?;
            tx.commit()?;
        }

        match migrate_legacy(&mut self.conn) {
            Ok(report) if report.is_empty() => {}
            Ok(report) => info!(
                meals_copied = report.meals_copied,
                meals_unresolved = report.meals_unresolved,
                last_had_backfilled = report.last_had_backfilled,
                "migrated legacy meal history"
            ),
            Err(err) => warn!(
                error = %err,
                from = version,
                "legacy schema migration failed, continuing with existing schema"
            ),
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects columns: 0: id, 1: name, 2: notes
    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            name: row.get(1)?,
            notes: row.get(2)?,
        })
    }

    // Expects columns: 0: m.id, 1: m.food_id, 2: f.name, 3: m.date, 4: m.notes
    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        Ok(Meal {
            id: row.get(0)?,
            food_id: row.get(1)?,
            food_name: row.get(2)?,
            date: row.get(3)?,
            notes: row.get(4)?,
        })
    }

    // --- Foods ---

    pub fn list_foods(&self) -> StoreResult<Vec<Food>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, COALESCE(notes, '') FROM foods ORDER BY name COLLATE NOCASE",
        )?;
        let foods = stmt
            .query_map([], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Foods with their most recent meal date, least recently eaten first.
    ///
    /// Foods that were never eaten have an empty `last_had` and sort before
    /// everything else.
    pub fn list_foods_with_last_meal(&self, today: NaiveDate) -> StoreResult<Vec<FoodWithLastMeal>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, COALESCE(f.notes, ''), COALESCE(MAX(m.date), '') AS last_had
             FROM foods f
             LEFT JOIN meals m ON m.food_id = f.id
             GROUP BY f.id
             ORDER BY last_had ASC, f.name COLLATE NOCASE",
        )?;
        let foods = stmt
            .query_map([], |row| {
                let food = Self::food_from_row(row)?;
                let last_had: String = row.get(3)?;
                Ok(FoodWithLastMeal {
                    food,
                    days_ago: days_ago(&last_had, today),
                    last_had,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn list_food_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM foods ORDER BY name COLLATE NOCASE")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn get_food(&self, id: i64) -> StoreResult<Option<Food>> {
        let food = self
            .conn
            .query_row(
                "SELECT id, name, COALESCE(notes, '') FROM foods WHERE id = ?1",
                params![id],
                Self::food_from_row,
            )
            .optional()?;
        Ok(food)
    }

    pub fn insert_food(&self, food: &NewFood) -> StoreResult<Food> {
        self.conn
            .execute(
                "INSERT INTO foods (name, notes) VALUES (?1, ?2)",
                params![food.name, food.notes],
            )
            .map_err(|e| map_unique(e, &food.name))?;
        Ok(Food {
            id: self.conn.last_insert_rowid(),
            name: food.name.clone(),
            notes: food.notes.clone().unwrap_or_default(),
        })
    }

    /// Returns `false` if no food has this id.
    pub fn update_food(&self, id: i64, food: &NewFood) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE foods SET name = ?1, notes = ?2 WHERE id = ?3",
                params![food.name, food.notes, id],
            )
            .map_err(|e| map_unique(e, &food.name))?;
        Ok(changed > 0)
    }

    /// Deletes the food and, through the foreign key, all of its meals.
    pub fn delete_food(&self, id: i64) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM foods WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    // --- Meals ---

    pub fn list_meals(&self) -> StoreResult<Vec<Meal>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.food_id, f.name, m.date, COALESCE(m.notes, '')
             FROM meals m
             JOIN foods f ON f.id = m.food_id
             ORDER BY m.date DESC, m.id DESC",
        )?;
        let meals = stmt
            .query_map([], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    /// Log a meal for the food with the given name.
    pub fn insert_meal(&self, meal: &NewMeal) -> StoreResult<Meal> {
        let tx = self.conn.unchecked_transaction()?;
        let food = tx
            .query_row(
                "SELECT id, name FROM foods WHERE name = ?1",
                params![meal.food_name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((food_id, food_name)) = food else {
            return Err(StoreError::FoodNotFound(meal.food_name.clone()));
        };

        let date = meal.date.format(DATE_FORMAT).to_string();
        tx.execute(
            "INSERT INTO meals (food_id, date, notes) VALUES (?1, ?2, ?3)",
            params![food_id, date, meal.notes],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Meal {
            id,
            food_id,
            food_name,
            date,
            notes: meal.notes.clone().unwrap_or_default(),
        })
    }

    pub fn delete_meal(&self, id: i64) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM meals WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

// --- Schema ---

fn meals_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            notes TEXT
        );"
    )
}

const MEALS_INDEXES: &str = "CREATE INDEX IF NOT EXISTS idx_meals_food_id ON meals(food_id);
     CREATE INDEX IF NOT EXISTS idx_meals_date ON meals(date);";

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    stmt.query_map(params![table], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()
}

fn create_core_tables(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS foods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            notes TEXT
        );",
    )?;

    // Version 1 databases predate notes.
    if !table_columns(tx, "foods")?.iter().any(|c| c == "notes") {
        tx.execute_batch("ALTER TABLE foods ADD COLUMN notes TEXT;")?;
    }

    // A name-keyed meals table from an older version is converted by
    // `migrate_legacy`, not here.
    if !table_exists(tx, "meals")? {
        tx.execute_batch(&meals_table_sql("meals"))?;
        tx.execute_batch(MEALS_INDEXES)?;
    }

    Ok(())
}

#[derive(Debug, Default)]
struct LegacyReport {
    meals_copied: usize,
    meals_unresolved: i64,
    last_had_backfilled: usize,
}

impl LegacyReport {
    fn is_empty(&self) -> bool {
        self.meals_copied == 0 && self.meals_unresolved == 0 && self.last_had_backfilled == 0
    }
}

/// Convert pre-version-2 data into the foreign-keyed meals table.
///
/// Runs in one transaction; nothing is changed unless every step succeeds.
fn migrate_legacy(conn: &mut Connection) -> rusqlite::Result<LegacyReport> {
    let tx = conn.transaction()?;
    let mut report = LegacyReport::default();

    let meal_columns = table_columns(&tx, "meals")?;
    if !meal_columns.iter().any(|c| c == "food_id") {
        let (copied, unresolved) = rebuild_name_keyed_meals(&tx, &meal_columns)?;
        report.meals_copied = copied;
        report.meals_unresolved = unresolved;
    }

    if table_columns(&tx, "foods")?.iter().any(|c| c == "last_had") {
        report.last_had_backfilled = tx.execute(
            "INSERT INTO meals (food_id, date)
             SELECT f.id, f.last_had FROM foods f
             WHERE f.last_had IS NOT NULL AND f.last_had != ''
               AND NOT EXISTS (
                   SELECT 1 FROM meals m WHERE m.food_id = f.id AND m.date = f.last_had
               )
             ORDER BY f.id",
            [],
        )?;
        tx.execute_batch("ALTER TABLE foods DROP COLUMN last_had;")?;
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(report)
}

/// Replace a meals table keyed by food name with one keyed by food id.
///
/// Rows are matched to foods by exact name. Rows whose name matches no food
/// are dropped and counted.
fn rebuild_name_keyed_meals(tx: &Transaction, columns: &[String]) -> rusqlite::Result<(usize, i64)> {
    let has = |name: &str| columns.iter().any(|c| c == name);

    let name_col = if has("food_name") {
        "food_name"
    } else if has("name") {
        "name"
    } else {
        return Err(rusqlite::Error::InvalidColumnName("meals.food_name".into()));
    };
    let date_col = if has("date") {
        "date"
    } else if has("last_had") {
        "last_had"
    } else {
        return Err(rusqlite::Error::InvalidColumnName("meals.date".into()));
    };
    let notes_expr = if has("notes") { "m.notes" } else { "NULL" };

    let unresolved: i64 = tx.query_row(
        &format!(
            "SELECT COUNT(*) FROM meals m
             WHERE NOT EXISTS (SELECT 1 FROM foods f WHERE f.name = m.{name_col})"
        ),
        [],
        |row| row.get(0),
    )?;
    if unresolved > 0 {
        warn!(rows = unresolved, "legacy meals reference unknown food names and will be dropped");
    }

    tx.execute_batch(&meals_table_sql("meals_new"))?;
    let copied = tx.execute(
        &format!(
            "INSERT INTO meals_new (food_id, date, notes)
             SELECT f.id, m.{date_col}, {notes_expr}
             FROM meals m
             JOIN foods f ON f.name = m.{name_col}
             WHERE m.{date_col} IS NOT NULL AND m.{date_col} != ''
             ORDER BY m.rowid"
        ),
        [],
    )?;
    tx.execute_batch(
        "DROP TABLE meals;
         ALTER TABLE meals_new RENAME TO meals;",
    )?;
    tx.execute_batch(MEALS_INDEXES)?;

    Ok((copied, unresolved))
}
