use chrono::NaiveDate;

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{Food, FoodWithLastMeal, Meal, NewFood, NewMeal};

/// Storage operations the web handlers and CLI depend on.
///
/// `Database` is the real implementation; tests can substitute their own.
/// Implementations are used behind a mutex, so they only need to be `Send`.
pub trait FoodStore: Send {
    fn list_foods_with_last_meal(&self, today: NaiveDate) -> StoreResult<Vec<FoodWithLastMeal>>;
    fn list_food_names(&self) -> StoreResult<Vec<String>>;
    fn list_meals(&self) -> StoreResult<Vec<Meal>>;
    fn insert_food(&self, food: &NewFood) -> StoreResult<Food>;
    fn update_food(&self, id: i64, food: &NewFood) -> StoreResult<bool>;
    fn delete_food(&self, id: i64) -> StoreResult<bool>;
    fn insert_meal(&self, meal: &NewMeal) -> StoreResult<Meal>;
    fn delete_meal(&self, id: i64) -> StoreResult<bool>;
}

impl FoodStore for Database {
    fn list_foods_with_last_meal(&self, today: NaiveDate) -> StoreResult<Vec<FoodWithLastMeal>> {
        Database::list_foods_with_last_meal(self, today)
    }

    fn list_food_names(&self) -> StoreResult<Vec<String>> {
        Database::list_food_names(self)
    }

    fn list_meals(&self) -> StoreResult<Vec<Meal>> {
        Database::list_meals(self)
    }

    fn insert_food(&self, food: &NewFood) -> StoreResult<Food> {
        Database::insert_food(self, food)
    }

    fn update_food(&self, id: i64, food: &NewFood) -> StoreResult<bool> {
        Database::update_food(self, id, food)
    }

    fn delete_food(&self, id: i64) -> StoreResult<bool> {
        Database::delete_food(self, id)
    }

    fn insert_meal(&self, meal: &NewMeal) -> StoreResult<Meal> {
        Database::insert_meal(self, meal)
    }

    fn delete_meal(&self, id: i64) -> StoreResult<bool> {
        Database::delete_meal(self, id)
    }
}
