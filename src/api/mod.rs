use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use url::Url;

use crate::models::*;

// ─── Error types ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Student not found")]
    NotFound,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("No valid rows found in CSV file")]
    EmptyCsv,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Pull the `message` field out of a JSON error body, falling back to a
/// generic line when the body is not the `{message}` shape.
fn extract_message(body: &str, status: u16) -> String {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with HTTP {status}"))
}

/// A blank or whitespace-only search query means "show everything".
pub fn normalize_query(q: &str) -> Option<&str> {
    let trimmed = q.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

// ─── Client ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RosterClient {
    client: Client,
    base_url: Url,
}

impl RosterClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid roster server URL: {base_url}"))?;

        let client = Client::builder()
            .user_agent("roster-tui/0.1.0")
            .build()?;

        Ok(Self { client, base_url })
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        let full = format!("/api{}", path);
        self.base_url
            .join(&full)
            .with_context(|| format!("Bad API path: {path}"))
    }

    async fn check_status(resp: Response) -> Result<Response, RosterError> {
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            let message = extract_message(&body, code);
            tracing::debug!(status = code, %message, "API error response");
            if status == StatusCode::NOT_FOUND {
                return Err(RosterError::NotFound);
            }
            return Err(RosterError::Api {
                status: code,
                message,
            });
        }
        Ok(resp)
    }

    async fn get(&self, url: Url) -> Result<Response, RosterError> {
        tracing::debug!(%url, "GET");
        let resp = self.client.get(url).send().await?;
        Self::check_status(resp).await
    }

    async fn multipart_post(&self, path: &str, file_path: &Path) -> Result<Response, RosterError> {
        let url = self.api_url(path).map_err(RosterError::Other)?;

        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        let data = std::fs::read(file_path).map_err(|e| {
            RosterError::Other(anyhow::anyhow!("Cannot read '{}': {e}", file_path.display()))
        })?;

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str("text/csv")
            .map_err(|e| RosterError::Other(anyhow::anyhow!("Invalid content-type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(%url, file = %file_path.display(), "POST multipart");
        let resp = self.client.post(url).multipart(form).send().await?;
        Self::check_status(resp).await
    }

    // ── Students ────────────────────────────────────────────────────────

    pub async fn list_students(&self) -> Result<Vec<Student>, RosterError> {
        let url = self.api_url("/students").map_err(RosterError::Other)?;
        let resp = self.get(url).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_student(&self, roll: i64) -> Result<Student, RosterError> {
        let url = self
            .api_url(&format!("/students/{roll}"))
            .map_err(RosterError::Other)?;
        let resp = self.get(url).await?;
        Ok(resp.json().await?)
    }

    pub async fn create_student(&self, payload: &StudentPayload) -> Result<Student, RosterError> {
        let url = self.api_url("/students").map_err(RosterError::Other)?;
        tracing::debug!(%url, roll = payload.roll, "POST create");
        let resp = self.client.post(url).json(payload).send().await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// The URL targets the roll the record had *before* this update; the
    /// payload may carry a different roll to rename the record.
    pub async fn update_student(
        &self,
        old_roll: i64,
        payload: &StudentPayload,
    ) -> Result<Student, RosterError> {
        let url = self
            .api_url(&format!("/students/{old_roll}"))
            .map_err(RosterError::Other)?;
        tracing::debug!(%url, new_roll = payload.roll, "PUT update");
        let resp = self.client.put(url).json(payload).send().await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_student(&self, roll: i64) -> Result<ApiMessage, RosterError> {
        let url = self
            .api_url(&format!("/students/{roll}"))
            .map_err(RosterError::Other)?;
        tracing::debug!(%url, "DELETE");
        let resp = self.client.delete(url).send().await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_all_students(&self) -> Result<ApiMessage, RosterError> {
        let url = self
            .api_url("/students/delete_all")
            .map_err(RosterError::Other)?;
        tracing::debug!(%url, "DELETE all");
        let resp = self.client.delete(url).send().await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Blank queries fall back to the unfiltered list so the table content
    /// matches a plain load.
    pub async fn search_students(&self, query: &str) -> Result<Vec<Student>, RosterError> {
        let Some(q) = normalize_query(query) else {
            return self.list_students().await;
        };
        let mut url = self
            .api_url("/students/search")
            .map_err(RosterError::Other)?;
        url.query_pairs_mut().append_pair("q", q);
        let resp = self.get(url).await?;
        Ok(resp.json().await?)
    }

    // ── CSV upload ──────────────────────────────────────────────────────

    /// Ask the backend to parse a CSV without committing it. A response with
    /// zero rows is an error even on HTTP success.
    pub async fn preview_csv(&self, file_path: &Path) -> Result<CsvPreview, RosterError> {
        let resp = self
            .multipart_post("/students/upload_preview", file_path)
            .await?;
        let preview: CsvPreview = resp.json().await?;
        if preview.rows.is_empty() {
            return Err(RosterError::EmptyCsv);
        }
        Ok(preview)
    }

    /// Finalize an import by re-sending the original file bytes. The backend
    /// re-parses and re-validates; the previewed rows are never sent back.
    pub async fn import_csv(&self, file_path: &Path) -> Result<ApiMessage, RosterError> {
        let resp = self.multipart_post("/students/upload", file_path).await?;
        Ok(resp.json().await?)
    }
}
