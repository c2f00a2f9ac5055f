use anyhow::Result;
use chrono::Local;
use std::process;

use wgze_core::db::Database;
use wgze_core::models::NewFood;

use super::helpers::{json_error, print_food_table};

pub(crate) fn cmd_food_add(
    db: &Database,
    name: &str,
    notes: Option<&str>,
    json: bool,
) -> Result<()> {
    let food = db.insert_food(&NewFood::parse(name, notes)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        let name = &food.name;
        let id = food.id;
        println!("Added food: {name} (id: {id})");
    }

    Ok(())
}

pub(crate) fn cmd_food_list(db: &Database, json: bool) -> Result<()> {
    let foods = db.list_foods_with_last_meal(Local::now().date_naive())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
        return Ok(());
    }

    if foods.is_empty() {
        eprintln!("No foods yet. Add one with `wgze food add <name>`");
    } else {
        print_food_table(&foods);
    }

    Ok(())
}

/// Delete a food and, through the cascade, every meal that references it.
pub(crate) fn cmd_food_delete(db: &Database, id: i64, json: bool) -> Result<()> {
    let Some(food) = db.get_food(id)? else {
        if json {
            println!("{}", json_error(&format!("Food {id} not found")));
        } else {
            eprintln!("Food {id} not found");
        }
        process::exit(2);
    };

    db.delete_food(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        let name = &food.name;
        println!("Deleted food {id} ({name}) and its meals");
    }

    Ok(())
}
