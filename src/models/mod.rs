use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Students ───────────────────────────────────────────────────────────────

/// One roster record as the backend stores it. `roll` is the unique,
/// user-editable identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub roll: i64,
    pub name: String,
    pub age: Option<i64>,
    pub course: Option<String>,
}

/// Body sent on create and update. On update the request URL carries the
/// *pre-update* roll while this body may carry a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentPayload {
    pub roll: i64,
    pub name: String,
    pub age: Option<i64>,
    pub course: String,
}

// ─── CSV upload ─────────────────────────────────────────────────────────────

/// A parsed CSV row keyed by column name. The client treats cells as opaque
/// JSON values; the backend sends numbers for roll/age and null for blanks.
pub type CsvRow = HashMap<String, serde_json::Value>;

/// Response from `POST /students/upload_preview`.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvPreview {
    #[serde(default)]
    pub rows: Vec<CsvRow>,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Total parsed rows; the backend may cap `rows` below this.
    pub count: Option<usize>,
    pub message: Option<String>,
}

impl CsvPreview {
    /// Total row count, falling back to the shipped rows when the backend
    /// omitted `count`.
    pub fn total_rows(&self) -> usize {
        self.count.unwrap_or(self.rows.len())
    }
}

/// Generic `{message}` body returned by mutating endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub message: Option<String>,
}

/// Render a CSV cell for display. Nulls become empty, strings are shown
/// bare, everything else falls back to its JSON text.
pub fn cell_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
