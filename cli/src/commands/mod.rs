mod food;
mod helpers;
mod meal;

pub(crate) use food::{cmd_food_add, cmd_food_delete, cmd_food_list};
pub(crate) use meal::{cmd_meal_add, cmd_meal_delete, cmd_meal_list};
