use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use wgze_core::models::{DATE_FORMAT, FoodWithLastMeal, Meal, NEVER_EATEN};

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match date_str {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - chrono::Duration::days(1)),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
    }
}

fn last_eaten(days_ago: i64) -> String {
    match days_ago {
        NEVER_EATEN => "never".to_string(),
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        n => format!("{n} days ago"),
    }
}

pub(crate) fn print_food_table(foods: &[FoodWithLastMeal]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Last eaten")]
        last_had: String,
        #[tabled(rename = "Days")]
        days: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.food.id,
            name: truncate(&f.food.name, 35),
            last_had: if f.last_had.is_empty() {
                "-".to_string()
            } else {
                f.last_had.clone()
            },
            days: last_eaten(f.days_ago),
            notes: truncate(&first_line(&f.food.notes), 40),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_meal_table(meals: &[Meal]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id,
            date: m.date.clone(),
            food: truncate(&m.food_name, 35),
            notes: truncate(&first_line(&m.notes), 40),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or_default().to_string()
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
