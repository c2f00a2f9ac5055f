use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format used for meal dates, both in the database and on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Marker for "no valid last-eaten date known".
pub const NEVER_EATEN: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    /// Empty when the food has no notes.
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meal {
    pub id: i64,
    pub food_id: i64,
    // Joined from foods for display
    pub food_name: String,
    pub date: String,
    pub notes: String,
}

/// A food together with the date it was last eaten.
///
/// Not persisted; rebuilt from the meals table on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoodWithLastMeal {
    #[serde(flatten)]
    pub food: Food,
    /// Most recent meal date, or empty if the food was never eaten.
    pub last_had: String,
    /// Days since `last_had`, or [`NEVER_EATEN`].
    pub days_ago: i64,
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub notes: Option<String>,
}

impl NewFood {
    /// Validate a raw name/notes pair as submitted by a form or the CLI.
    pub fn parse(name: &str, notes: Option<&str>) -> Result<Self> {
        Ok(Self {
            name: validate_food_name(name)?,
            notes: normalize_notes(notes),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub food_name: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

impl NewMeal {
    pub fn parse(food_name: &str, date: &str, notes: Option<&str>) -> Result<Self> {
        let food_name = food_name.trim();
        if food_name.is_empty() {
            bail!("Food name and date are required");
        }
        Ok(Self {
            food_name: food_name.to_string(),
            date: parse_meal_date(date)?,
            notes: normalize_notes(notes),
        })
    }
}

pub fn validate_food_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Food name is required");
    }
    Ok(name.to_string())
}

pub fn parse_meal_date(date: &str) -> Result<NaiveDate> {
    let date = date.trim();
    if date.is_empty() {
        bail!("Food name and date are required");
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .with_context(|| format!("Invalid date '{date}'. Use YYYY-MM-DD"))
}

/// Blank notes are stored as NULL.
#[must_use]
pub fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Whole days between `last_had` (`YYYY-MM-DD`) and `today`.
///
/// Returns [`NEVER_EATEN`] for empty or unparsable input. This is the same
/// count as `floor((now - last_had at midnight) / 24h)` but immune to DST
/// shifts. Dates in the future count as today so they never read as the
/// sentinel.
#[must_use]
pub fn days_ago(last_had: &str, today: NaiveDate) -> i64 {
    match NaiveDate::parse_from_str(last_had.trim(), DATE_FORMAT) {
        Ok(date) => (today - date).num_days().max(0),
        Err(_) => NEVER_EATEN,
    }
}
