use anyhow::Result;
use std::process;

use wgze_core::db::Database;
use wgze_core::error::StoreError;
use wgze_core::models::{DATE_FORMAT, NewMeal};

use super::helpers::{json_error, parse_date, print_meal_table};

/// Same validation as the web form, after resolving `today`/`yesterday`.
fn new_meal(food: &str, date: Option<&str>, notes: Option<&str>) -> Result<NewMeal> {
    let date = parse_date(date)?.format(DATE_FORMAT).to_string();
    NewMeal::parse(food, &date, notes)
}

pub(crate) fn cmd_meal_add(
    db: &Database,
    food: &str,
    date: Option<&str>,
    notes: Option<&str>,
    json: bool,
) -> Result<()> {
    let meal = new_meal(food, date, notes)?;

    let meal = match db.insert_meal(&meal) {
        Ok(meal) => meal,
        Err(StoreError::FoodNotFound(name)) => {
            let message = format!("Food '{name}' does not exist. Add it with `wgze food add`");
            if json {
                println!("{}", json_error(&message));
            } else {
                eprintln!("{message}");
            }
            process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        let name = &meal.food_name;
        let date = &meal.date;
        let id = meal.id;
        println!("Logged {name} on {date} (id: {id})");
    }

    Ok(())
}

pub(crate) fn cmd_meal_list(db: &Database, json: bool) -> Result<()> {
    let meals = db.list_meals()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
        return Ok(());
    }

    if meals.is_empty() {
        eprintln!("No meals logged yet");
    } else {
        print_meal_table(&meals);
    }

    Ok(())
}

pub(crate) fn cmd_meal_delete(db: &Database, id: i64, json: bool) -> Result<()> {
    if db.delete_meal(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted meal {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Meal {id} not found")));
        } else {
            eprintln!("Meal {id} not found");
        }
        process::exit(2);
    }
}
