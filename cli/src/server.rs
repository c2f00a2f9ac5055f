use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Form, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Local;
use serde::Deserialize;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::views::{Fragment, HtmlResponse, Page, StatusSnippet};
use wgze_core::db::Database;
use wgze_core::error::StoreError;
use wgze_core::models::{DATE_FORMAT, NewFood, NewMeal};
use wgze_core::store::FoodStore;

const BODY_LIMIT: usize = 64 * 1024; // 64 KB

#[derive(Clone)]
pub(crate) struct AppState {
    store: Arc<Mutex<dyn FoodStore>>,
}

impl AppState {
    pub(crate) fn new(store: impl FoodStore + 'static) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn store(&self) -> MutexGuard<'_, dyn FoodStore + 'static> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Forms ---

#[derive(Deserialize)]
struct FoodForm {
    #[serde(default)]
    name: String,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct AddMealForm {
    #[serde(default)]
    food_name: String,
    #[serde(default)]
    date: String,
    notes: Option<String>,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Internal(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::Internal(err) => {
                error!("store error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_lookup() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err)
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID")))
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}

// --- Pages ---

async fn home(State(state): State<AppState>) -> Result<HtmlResponse, ApiError> {
    let food_names = state.store().list_food_names()?;
    Ok(HtmlResponse::FullPage(Page::Home {
        food_names,
        today: Local::now().date_naive().format(DATE_FORMAT).to_string(),
    }))
}

async fn foods_page(State(state): State<AppState>) -> Result<HtmlResponse, ApiError> {
    let foods = state
        .store()
        .list_foods_with_last_meal(Local::now().date_naive())?;
    Ok(HtmlResponse::FullPage(Page::Foods(foods)))
}

async fn meals_page(State(state): State<AppState>) -> Result<HtmlResponse, ApiError> {
    let meals = state.store().list_meals()?;
    Ok(HtmlResponse::FullPage(Page::Meals(meals)))
}

// --- Actions ---

/// The form posts into a message box, so every outcome is an HTML snippet.
async fn add_meal(State(state): State<AppState>, Form(form): Form<AddMealForm>) -> Response {
    let meal = match NewMeal::parse(&form.food_name, &form.date, form.notes.as_deref()) {
        Ok(meal) => meal,
        Err(e) => {
            return StatusSnippet::error(StatusCode::BAD_REQUEST, &e.to_string()).into_response();
        }
    };

    let result = state.store().insert_meal(&meal);
    match result {
        Ok(meal) => {
            info!(food = %meal.food_name, date = %meal.date, "meal added");
            ([("HX-Trigger", "meal-added")], StatusSnippet::meal_added()).into_response()
        }
        Err(StoreError::FoodNotFound(name)) => StatusSnippet::unknown_food(&name).into_response(),
        Err(err) => {
            error!("store error: {err}");
            StatusSnippet::error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
                .into_response()
        }
    }
}

fn food_list(store: &dyn FoodStore) -> Result<HtmlResponse, ApiError> {
    let foods = store.list_foods_with_last_meal(Local::now().date_naive())?;
    Ok(HtmlResponse::Fragment(Fragment::FoodList(foods)))
}

async fn add_food(
    State(state): State<AppState>,
    Form(form): Form<FoodForm>,
) -> Result<HtmlResponse, ApiError> {
    let food = NewFood::parse(&form.name, form.notes.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let store = state.store();
    let food = store.insert_food(&food)?;
    info!(id = food.id, name = %food.name, "food added");
    food_list(&*store)
}

async fn edit_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<FoodForm>,
) -> Result<HtmlResponse, ApiError> {
    let id = parse_id(&id, "food")?;
    let food = NewFood::parse(&form.name, form.notes.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let store = state.store();
    if !store.update_food(id, &food)? {
        return Err(ApiError::BadRequest(format!("Food {id} not found")));
    }
    info!(id, name = %food.name, "food updated");
    food_list(&*store)
}

async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<HtmlResponse, ApiError> {
    let id = parse_id(&id, "food")?;

    let store = state.store();
    if !store.delete_food(id)? {
        return Err(ApiError::BadRequest(format!("Food {id} not found")));
    }
    info!(id, "food deleted");
    food_list(&*store)
}

async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<HtmlResponse, ApiError> {
    let id = parse_id(&id, "meal")?;

    let store = state.store();
    if !store.delete_meal(id)? {
        return Err(ApiError::BadRequest(format!("Meal {id} not found")));
    }
    info!(id, "meal deleted");
    Ok(HtmlResponse::Fragment(Fragment::MealList(
        store.list_meals()?,
    )))
}

fn build_router(state: AppState, static_dir: &FsPath) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/speisen", get(foods_page))
        .route("/mahlzeiten", get(meals_page))
        .route("/add-meal", post(add_meal))
        .route("/add-food", post(add_food))
        .route("/edit-food/{id}", post(edit_food))
        .route("/delete-food/{id}", delete(delete_food))
        .route("/delete-meal/{id}", delete(delete_meal))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: Database,
    bind: &str,
    port: u16,
    static_dir: &FsPath,
) -> anyhow::Result<()> {
    if !static_dir.is_dir() {
        warn!(
            "static directory {} not found; /static/* will return 404",
            static_dir.display()
        );
    }

    let app = build_router(AppState::new(db), static_dir);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::{Duration, NaiveDate};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wgze_core::error::StoreResult;
    use wgze_core::models::{Food, FoodWithLastMeal, Meal};

    fn test_app() -> Router {
        let db = Database::open_in_memory().unwrap();
        build_router(AppState::new(db), FsPath::new("does-not-exist"))
    }

    async fn send(app: &Router, request: axum::http::Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get_req(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn form_req(uri: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete_req(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::delete(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn today() -> String {
        Local::now().date_naive().format(DATE_FORMAT).to_string()
    }

    #[tokio::test]
    async fn pages_render_on_empty_store() {
        let app = test_app();

        let (status, body) = send(&app, get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<title>WGZE - Home</title>"));
        assert!(body.contains("Erst Speisen hinzufügen"));
        assert!(body.contains(&format!(r#"value="{}""#, today())));

        let (status, body) = send(&app, get_req("/speisen")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Noch keine Speisen hinzugefügt"));

        let (status, body) = send(&app, get_req("/mahlzeiten")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Noch keine Mahlzeiten erfasst"));
    }

    #[tokio::test]
    async fn add_food_then_meal_shows_in_history() {
        let app = test_app();

        let (status, body) = send(&app, form_req("/add-food", "name=Apple&notes=")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("<html"));
        assert!(body.contains("Apple"));
        assert!(body.contains("Noch nie gegessen"));

        let date = today();
        let response = app
            .clone()
            .oneshot(form_req(
                "/add-meal",
                &format!("food_name=Apple&date={date}&notes=lecker"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("hx-trigger").unwrap(), "meal-added");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("erfolgreich"));

        let (_, body) = send(&app, get_req("/mahlzeiten")).await;
        assert!(body.contains(&date));
        assert!(body.contains("Apple"));
        assert!(body.contains("lecker"));

        let (_, body) = send(&app, get_req("/speisen")).await;
        assert!(body.contains("Heute gegessen"));

        let (_, body) = send(&app, get_req("/")).await;
        assert!(body.contains(r#"<option value="Apple"></option>"#));
    }

    #[tokio::test]
    async fn foods_sorted_by_recency() {
        let app = test_app();
        send(&app, form_req("/add-food", "name=Recent")).await;
        send(&app, form_req("/add-food", "name=Old")).await;
        send(&app, form_req("/add-food", "name=Never")).await;

        let old = (Local::now().date_naive() - Duration::days(10))
            .format(DATE_FORMAT)
            .to_string();
        send(&app, form_req("/add-meal", &format!("food_name=Old&date={old}"))).await;
        send(
            &app,
            form_req("/add-meal", &format!("food_name=Recent&date={}", today())),
        )
        .await;

        let (_, body) = send(&app, get_req("/speisen")).await;
        let never = body.find("Never").unwrap();
        let old = body.find("Old").unwrap();
        let recent = body.find("Recent").unwrap();
        assert!(never < old && old < recent);
        assert!(body.contains("Vor 10 Tagen gegessen"));
    }

    #[tokio::test]
    async fn add_meal_unknown_food() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(form_req("/add-meal", "food_name=Ghost&date=2024-01-01"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("hx-trigger").is_none());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("Ghost"));
        assert!(body.contains("/speisen"));

        let (_, body) = send(&app, get_req("/mahlzeiten")).await;
        assert!(body.contains("Noch keine Mahlzeiten erfasst"));
    }

    #[tokio::test]
    async fn add_meal_validation() {
        let app = test_app();
        send(&app, form_req("/add-food", "name=Apple")).await;

        let (status, body) = send(&app, form_req("/add-meal", "food_name=&date=2024-01-01")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("required"));

        let (status, _) = send(&app, form_req("/add-meal", "food_name=Apple")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&app, form_req("/add-meal", "food_name=Apple&date=01.01.2024")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("YYYY-MM-DD"));
    }

    #[tokio::test]
    async fn add_food_requires_name() {
        let app = test_app();
        let (status, body) = send(&app, form_req("/add-food", "name=++&notes=x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Food name is required");

        let (status, _) = send(&app, form_req("/add-food", "notes=x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_food_is_server_error() {
        let app = test_app();
        send(&app, form_req("/add-food", "name=Apple")).await;
        let (status, body) = send(&app, form_req("/add-food", "name=Apple")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("already exists"));
    }

    #[tokio::test]
    async fn edit_food_updates_list() {
        let app = test_app();
        send(&app, form_req("/add-food", "name=Apple")).await;

        let (status, body) = send(
            &app,
            form_req("/edit-food/1", "name=Green+Apple&notes=sauer"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Green Apple"));
        assert!(body.contains("sauer"));
    }

    #[tokio::test]
    async fn edit_food_bad_ids() {
        let app = test_app();
        let (status, body) = send(&app, form_req("/edit-food/abc", "name=X")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid food ID");

        let (status, _) = send(&app, form_req("/edit-food/42", "name=X")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, form_req("/add-food", "name=Apple")).await;
        let (status, _) = send(&app, form_req("/edit-food/1", "name=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_food_cascades_to_meals() {
        let app = test_app();
        send(&app, form_req("/add-food", "name=Apple")).await;
        send(&app, form_req("/add-food", "name=Pear")).await;
        send(&app, form_req("/add-meal", "food_name=Apple&date=2024-01-01")).await;
        send(&app, form_req("/add-meal", "food_name=Pear&date=2024-01-02")).await;

        let (status, body) = send(&app, delete_req("/delete-food/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("Apple"));
        assert!(body.contains("Pear"));

        let (_, body) = send(&app, get_req("/mahlzeiten")).await;
        assert!(!body.contains("Apple"));
        assert!(body.contains("Pear"));

        let (status, _) = send(&app, delete_req("/delete-food/1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, delete_req("/delete-food/x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid food ID");
    }

    #[tokio::test]
    async fn delete_meal_returns_remaining() {
        let app = test_app();
        send(&app, form_req("/add-food", "name=Apple")).await;
        send(&app, form_req("/add-meal", "food_name=Apple&date=2024-01-01")).await;

        let (status, body) = send(&app, delete_req("/delete-meal/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Noch keine Mahlzeiten erfasst"));

        let (status, _) = send(&app, delete_req("/delete-meal/1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn user_text_is_escaped() {
        let app = test_app();
        let (status, body) = send(
            &app,
            form_req("/add-food", "name=%3Cscript%3Ealert(1)%3C%2Fscript%3E"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[tokio::test]
    async fn static_files_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('hi');").unwrap();
        let app = build_router(
            AppState::new(Database::open_in_memory().unwrap()),
            dir.path(),
        );

        let (status, body) = send(&app, get_req("/static/app.js")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log('hi');");

        let (status, _) = send(&app, get_req("/static/missing.css")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _) = send(&test_app(), get_req("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let response = test_app().oneshot(get_req("/")).await.unwrap();
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let big = format!("name={}", "a".repeat(BODY_LIMIT + 1));
        let request = axum::http::Request::post("/add-food")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("content-length", big.len())
            .body(Body::from(big))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    struct BrokenStore;

    fn broken<T>() -> StoreResult<T> {
        Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    impl FoodStore for BrokenStore {
        fn list_foods_with_last_meal(&self, _today: NaiveDate) -> StoreResult<Vec<FoodWithLastMeal>> {
            broken()
        }
        fn list_food_names(&self) -> StoreResult<Vec<String>> {
            broken()
        }
        fn list_meals(&self) -> StoreResult<Vec<Meal>> {
            broken()
        }
        fn insert_food(&self, _food: &NewFood) -> StoreResult<Food> {
            broken()
        }
        fn update_food(&self, _id: i64, _food: &NewFood) -> StoreResult<bool> {
            broken()
        }
        fn delete_food(&self, _id: i64) -> StoreResult<bool> {
            broken()
        }
        fn insert_meal(&self, _meal: &NewMeal) -> StoreResult<Meal> {
            broken()
        }
        fn delete_meal(&self, _id: i64) -> StoreResult<bool> {
            broken()
        }
    }

    #[tokio::test]
    async fn store_failures_are_500() {
        let app = build_router(AppState::new(BrokenStore), FsPath::new("does-not-exist"));

        for uri in ["/", "/speisen", "/mahlzeiten"] {
            let (status, _) = send(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        }

        let (status, _) = send(&app, form_req("/add-food", "name=Apple")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) =
            send(&app, form_req("/add-meal", "food_name=Apple&date=2024-01-01")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("❌"));

        let (status, _) = send(&app, delete_req("/delete-food/1")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
