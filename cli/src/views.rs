//! Server-rendered HTML.
//!
//! Handlers pick an [`HtmlResponse`]: a full page wrapped in the shared
//! layout, or a fragment that htmx swaps into an existing page. Pages embed
//! the same fragments, so a partial update renders exactly what a reload
//! would show.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use wgze_core::models::{FoodWithLastMeal, Meal, NEVER_EATEN};

pub(crate) enum HtmlResponse {
    FullPage(Page),
    Fragment(Fragment),
}

pub(crate) enum Page {
    Home {
        food_names: Vec<String>,
        today: String,
    },
    Foods(Vec<FoodWithLastMeal>),
    Meals(Vec<Meal>),
}

pub(crate) enum Fragment {
    FoodList(Vec<FoodWithLastMeal>),
    MealList(Vec<Meal>),
}

impl HtmlResponse {
    pub(crate) fn render(&self) -> String {
        match self {
            Self::FullPage(page) => page.render(),
            Self::Fragment(fragment) => fragment.render(),
        }
    }
}

impl IntoResponse for HtmlResponse {
    fn into_response(self) -> Response {
        Html(self.render()).into_response()
    }
}

impl Page {
    fn render(&self) -> String {
        match self {
            Self::Home { food_names, today } => layout("WGZE - Home", &home(food_names, today)),
            Self::Foods(foods) => layout("WGZE - Speisen", &foods_page(foods)),
            Self::Meals(meals) => layout("WGZE - Mahlzeiten", &meals_page(meals)),
        }
    }
}

impl Fragment {
    fn render(&self) -> String {
        match self {
            Self::FoodList(foods) => food_list(foods),
            Self::MealList(meals) => meal_list(meals),
        }
    }
}

/// Small message box returned by the add-meal form.
pub(crate) struct StatusSnippet {
    status: StatusCode,
    html: String,
}

impl StatusSnippet {
    pub(crate) fn meal_added() -> Self {
        Self::success("✅ Mahlzeit erfolgreich hinzugefügt!")
    }

    pub(crate) fn unknown_food(name: &str) -> Self {
        let name = escape_html(name);
        Self::error_html(
            StatusCode::BAD_REQUEST,
            &format!(
                "❌ Die Speise \"{name}\" existiert nicht! Bitte fügen Sie sie zuerst auf der \
                 <a href=\"/speisen\" class=\"underline hover:text-red-800\">Speisen-Seite</a> hinzu."
            ),
        )
    }

    pub(crate) fn error(status: StatusCode, message: &str) -> Self {
        Self::error_html(status, &format!("❌ {}", escape_html(message)))
    }

    fn success(message_html: &str) -> Self {
        Self {
            status: StatusCode::OK,
            html: format!(
                r##"<div class="bg-green-100 border border-green-400 text-green-700 px-4 py-3 rounded">{message_html}</div>"##
            ),
        }
    }

    fn error_html(status: StatusCode, message_html: &str) -> Self {
        Self {
            status,
            html: format!(
                r##"<div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded">{message_html}</div>"##
            ),
        }
    }
}

impl IntoResponse for StatusSnippet {
    fn into_response(self) -> Response {
        (self.status, Html(self.html)).into_response()
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// CSS class and label describing how long ago a food was eaten.
pub(crate) fn recency(days_ago: i64) -> (&'static str, String) {
    match days_ago {
        NEVER_EATEN => ("text-red-500", "Noch nie gegessen".to_string()),
        0 => ("text-green-500", "Heute gegessen".to_string()),
        1 => ("text-green-500", "Gestern gegessen".to_string()),
        2..=7 => ("text-green-500", format!("Vor {days_ago} Tagen gegessen")),
        8..=30 => ("text-yellow-500", format!("Vor {days_ago} Tagen gegessen")),
        _ => ("text-red-500", format!("Vor {days_ago} Tagen gegessen")),
    }
}

const NAV: &str = r##"<nav class="bg-blue-600 text-white p-4 mb-8">
  <div class="max-w-4xl mx-auto flex justify-between items-center">
    <h1 class="text-xl font-bold">🍽️ WGZE</h1>
    <div class="flex gap-4">
      <a href="/" class="hover:bg-blue-700 px-3 py-2 rounded transition-colors">Home</a>
      <a href="/speisen" class="hover:bg-blue-700 px-3 py-2 rounded transition-colors">Speisen</a>
      <a href="/mahlzeiten" class="hover:bg-blue-700 px-3 py-2 rounded transition-colors">Mahlzeiten</a>
    </div>
  </div>
</nav>"##;

const INPUT_CLASS: &str = "w-full px-4 py-2 border border-gray-300 rounded-lg focus:ring-2 focus:ring-blue-500 focus:border-blue-500 outline-none";

fn layout(title: &str, body: &str) -> String {
    let title = escape_html(title);
    format!(
        r##"<!DOCTYPE html>
<html lang="de">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <script src="https://unpkg.com/htmx.org@1.9.10"></script>
  <script src="https://cdn.tailwindcss.com"></script>
  <link rel="stylesheet" href="/static/style.css">
  <script src="/static/app.js" defer></script>
</head>
<body class="bg-gray-100 min-h-screen">
{NAV}
{body}
</body>
</html>
"##
    )
}

fn home(food_names: &[String], today: &str) -> String {
    let today = escape_html(today);
    let (food_input, submit) = if food_names.is_empty() {
        (
            r##"<div class="w-full px-4 py-2 border border-gray-300 rounded-lg bg-gray-50 text-gray-500">
            Keine Speisen verfügbar. <a href="/speisen" class="text-blue-500 hover:text-blue-600 underline">Fügen Sie zuerst Speisen hinzu</a>.
          </div>"##
                .to_string(),
            r##"<button type="button" disabled class="w-full px-6 py-3 bg-gray-400 text-white rounded-lg cursor-not-allowed font-medium text-lg">Erst Speisen hinzufügen</button>"##
                .to_string(),
        )
    } else {
        let options: String = food_names
            .iter()
            .map(|name| format!("<option value=\"{}\"></option>", escape_html(name)))
            .collect();
        (
            format!(
                r##"<input type="text" id="food_name" name="food_name" placeholder="Name der Speise eingeben..." required
                 list="food-suggestions" autocomplete="off" oninput="validateFoodName()" class="{INPUT_CLASS}">
          <datalist id="food-suggestions">{options}</datalist>
          <div id="food-validation-message" class="mt-1 text-sm hidden"></div>"##
            ),
            r##"<button type="submit" id="submit-btn" class="w-full px-6 py-3 bg-blue-500 text-white rounded-lg hover:bg-blue-600 transition-colors font-medium text-lg">Mahlzeit hinzufügen</button>"##
                .to_string(),
        )
    };

    format!(
        r##"<div class="max-w-4xl mx-auto px-4">
  <div class="bg-white rounded-lg shadow-lg p-8">
    <h2 class="text-2xl font-bold text-gray-800 mb-6 text-center">Was gab's am...</h2>
    <div class="max-w-md mx-auto">
      <form id="meal-form" hx-post="/add-meal" hx-target="#message" hx-swap="innerHTML" class="space-y-4">
        <div>
          <label for="date" class="block text-sm font-medium text-gray-700 mb-2">Datum:</label>
          <input type="date" id="date" name="date" value="{today}" required class="{INPUT_CLASS}">
        </div>
        <div>
          <label for="food_name" class="block text-sm font-medium text-gray-700 mb-2">Speise:</label>
          {food_input}
        </div>
        <div>
          <label for="notes" class="block text-sm font-medium text-gray-700 mb-2">Anmerkungen (optional):</label>
          <textarea id="notes" name="notes" placeholder="Zusätzliche Notizen..." rows="3" class="{INPUT_CLASS} resize-none"></textarea>
        </div>
        {submit}
      </form>
      <div id="message" class="mt-4 text-center"></div>
    </div>
  </div>
</div>"##
    )
}

fn foods_page(foods: &[FoodWithLastMeal]) -> String {
    format!(
        r##"<div class="max-w-4xl mx-auto px-4">
  <div class="bg-white rounded-lg shadow-lg p-8 mb-8">
    <h2 class="text-2xl font-bold text-gray-800 mb-6">Neue Speise hinzufügen</h2>
    <form hx-post="/add-food" hx-target="#food-list" hx-swap="innerHTML" hx-on::after-request="if(event.detail.successful) this.reset()" class="space-y-4">
      <div>
        <label for="name" class="block text-sm font-medium text-gray-700 mb-2">Name der Speise:</label>
        <input type="text" id="name" name="name" required class="{INPUT_CLASS}">
      </div>
      <div>
        <label for="food-notes" class="block text-sm font-medium text-gray-700 mb-2">Anmerkungen / Rezept (optional):</label>
        <textarea id="food-notes" name="notes" rows="4" class="{INPUT_CLASS} resize-vertical"></textarea>
      </div>
      <button type="submit" class="px-6 py-2 bg-blue-500 text-white rounded-lg hover:bg-blue-600 transition-colors font-medium">Speise hinzufügen</button>
    </form>
  </div>
  <div class="bg-white rounded-lg shadow-lg p-8">
    <h2 class="text-2xl font-bold text-gray-800 mb-6">Speisen</h2>
    <div id="food-list">
{list}
    </div>
  </div>
</div>"##,
        list = food_list(foods)
    )
}

fn food_list(foods: &[FoodWithLastMeal]) -> String {
    if foods.is_empty() {
        return r##"<div class="text-center py-12 text-gray-500">
  <div class="text-lg mb-2">Noch keine Speisen hinzugefügt</div>
  <div class="text-sm">Fügen Sie Ihre erste Speise oben hinzu!</div>
</div>"##
            .to_string();
    }

    foods.iter().map(food_item).collect::<Vec<_>>().join("\n")
}

fn food_item(entry: &FoodWithLastMeal) -> String {
    let id = entry.food.id;
    let name = escape_html(&entry.food.name);
    let notes = escape_html(&entry.food.notes);
    let notes_display = if entry.food.notes.is_empty() {
        String::new()
    } else {
        format!(r##"<div class="text-sm text-gray-600 mb-1 whitespace-pre-wrap">{notes}</div>"##)
    };
    let (recency_class, recency_label) = recency(entry.days_ago);

    format!(
        r##"<div class="p-4 bg-white border border-gray-200 rounded-lg mb-3 shadow-sm hover:shadow-md transition-shadow" id="food-{id}">
  <div class="food-display">
    <div class="flex items-start justify-between">
      <div class="flex-1">
        <div class="text-lg font-semibold text-gray-800 mb-1">{name}</div>
        {notes_display}
        <div class="text-sm"><span class="{recency_class} font-medium">{recency_label}</span></div>
      </div>
      <div class="flex gap-2 ml-4">
        <button class="px-4 py-2 bg-blue-500 text-white rounded-lg hover:bg-blue-600 transition-colors text-sm font-medium" onclick="toggleEdit({id})">Bearbeiten</button>
        <button class="px-4 py-2 bg-red-500 text-white rounded-lg hover:bg-red-600 transition-colors text-sm font-medium"
                hx-delete="/delete-food/{id}" hx-target="#food-list" hx-swap="innerHTML"
                hx-confirm="Sind Sie sicher, dass Sie diese Speise löschen möchten? Alle zugehörigen Mahlzeiten werden ebenfalls gelöscht!">Löschen</button>
      </div>
    </div>
  </div>
  <div class="food-edit hidden">
    <form hx-post="/edit-food/{id}" hx-target="#food-list" hx-swap="innerHTML" class="space-y-4">
      <div>
        <label class="block text-sm font-medium text-gray-700 mb-2">Name der Speise:</label>
        <input type="text" name="name" value="{name}" required class="{INPUT_CLASS}">
      </div>
      <div>
        <label class="block text-sm font-medium text-gray-700 mb-2">Anmerkungen / Rezept:</label>
        <textarea name="notes" rows="6" class="{INPUT_CLASS} resize-vertical">{notes}</textarea>
      </div>
      <div class="flex gap-2">
        <button type="submit" class="px-4 py-2 bg-green-500 text-white rounded-lg hover:bg-green-600 transition-colors text-sm font-medium">Speichern</button>
        <button type="button" onclick="toggleEdit({id})" class="px-4 py-2 bg-gray-500 text-white rounded-lg hover:bg-gray-600 transition-colors text-sm font-medium">Abbrechen</button>
      </div>
    </form>
  </div>
</div>"##
    )
}

fn meals_page(meals: &[Meal]) -> String {
    format!(
        r##"<div class="max-w-6xl mx-auto px-4">
  <div class="bg-white rounded-lg shadow-lg p-8">
    <h2 class="text-2xl font-bold text-gray-800 mb-6">Mahlzeiten Historie</h2>
    <div id="meal-list">
{list}
    </div>
  </div>
</div>"##,
        list = meal_list(meals)
    )
}

const TH_CLASS: &str = "border border-gray-300 px-4 py-3 text-left font-semibold text-gray-700";

fn meal_list(meals: &[Meal]) -> String {
    if meals.is_empty() {
        return r##"<div class="text-center py-12 text-gray-500">
  <div class="text-6xl mb-4">🍽️</div>
  <div class="text-lg mb-2">Noch keine Mahlzeiten erfasst</div>
  <div class="text-sm mb-4">
    Gehen Sie zur <a href="/" class="text-blue-500 hover:text-blue-600 underline">Startseite</a> um Ihre erste Mahlzeit hinzuzufügen.
  </div>
</div>"##
            .to_string();
    }

    let rows: String = meals.iter().map(meal_row).collect();
    format!(
        r##"<div class="overflow-x-auto">
  <table class="w-full border-collapse border border-gray-300">
    <thead>
      <tr class="bg-gray-50">
        <th class="{TH_CLASS}">Datum</th>
        <th class="{TH_CLASS}">Speise</th>
        <th class="{TH_CLASS}">Anmerkungen</th>
        <th class="{TH_CLASS}">Aktionen</th>
      </tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</div>"##
    )
}

fn meal_row(meal: &Meal) -> String {
    let id = meal.id;
    let date = escape_html(&meal.date);
    let food = escape_html(&meal.food_name);
    let notes = if meal.notes.is_empty() {
        r##"<span class="text-gray-400 italic">Keine Anmerkungen</span>"##.to_string()
    } else {
        format!(
            r##"<div class="whitespace-pre-wrap break-words">{}</div>"##,
            escape_html(&meal.notes)
        )
    };

    format!(
        r##"      <tr class="hover:bg-gray-50 transition-colors" id="meal-{id}">
        <td class="border border-gray-300 px-4 py-3 text-gray-800 font-medium">{date}</td>
        <td class="border border-gray-300 px-4 py-3 text-gray-800">{food}</td>
        <td class="border border-gray-300 px-4 py-3 text-gray-600 max-w-md">{notes}</td>
        <td class="border border-gray-300 px-4 py-3">
          <button class="px-3 py-1 bg-red-500 text-white rounded hover:bg-red-600 transition-colors text-sm font-medium"
                  hx-delete="/delete-meal/{id}" hx-target="#meal-list" hx-swap="innerHTML"
                  hx-confirm="Sind Sie sicher, dass Sie diese Mahlzeit löschen möchten?">Löschen</button>
        </td>
      </tr>
"##
    )
}
