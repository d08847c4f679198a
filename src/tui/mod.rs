pub mod event;
pub mod form;
pub mod preview;
pub mod ui;

use chrono::{DateTime, Utc};
use ratatui::widgets::TableState;
use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::api::{normalize_query, RosterClient};
use crate::models::*;
use form::StudentForm;

// ─── Pending CSV upload ─────────────────────────────────────────────────────

/// A previewed-but-not-yet-confirmed CSV import. At most one exists at a
/// time; a new preview or a dismissal replaces it. Confirming re-sends the
/// original file from `path`, not the parsed rows.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub path: PathBuf,
    pub rows: Vec<CsvRow>,
    pub fields: Vec<String>,
    /// Total parsed rows as reported by the backend (rows may be capped).
    pub total: usize,
    pub message: String,
}

// ─── Modal state machine ────────────────────────────────────────────────────

/// The single active overlay. `Hidden` is the idle table view; the editing
/// and upload flows never run at the same time.
#[derive(Debug, Default)]
pub enum Modal {
    #[default]
    Hidden,
    /// Add/edit form. `original` is the roll the record had when the edit
    /// opened; `None` means the next save is a create. An update targets
    /// `original` in the URL even when the form now carries a new roll.
    Editing {
        original: Option<i64>,
        form: StudentForm,
    },
    ConfirmDelete {
        roll: i64,
        name: String,
    },
    ConfirmDeleteAll,
    /// Typing the path of a CSV file to preview.
    CsvPathPrompt {
        input: String,
        error: Option<String>,
    },
    /// Preview table shown for the upload held in `App::pending_csv`.
    CsvPreview,
}

impl Modal {
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }
}

// ─── Background task results ────────────────────────────────────────────────

pub struct FetchResult {
    pub students: Vec<Student>,
    /// The search query this result answers; `None` is the full list.
    pub query: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    DeleteAll,
    Import,
}

pub struct ActionResult {
    pub kind: ActionKind,
    /// Ok carries the status-bar message, Err the user-facing failure text.
    pub result: Result<String, String>,
}

// ─── Table cursor ───────────────────────────────────────────────────────────

/// Logical selection plus the ratatui scroll offset for the roster table.
pub struct TableCursor {
    pub inner: TableState,
    pub selected: usize,
    pub len: usize,
}

impl TableCursor {
    pub fn new() -> Self {
        let mut inner = TableState::default();
        inner.select(Some(0));
        Self {
            inner,
            selected: 0,
            len: 0,
        }
    }

    /// Move down — clamped at the last row (no wrap-around).
    pub fn select_next(&mut self) {
        if self.len > 0 && self.selected + 1 < self.len {
            self.selected += 1;
        }
    }

    /// Move up — clamped at the first row (no wrap-around).
    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.selected >= len && len > 0 {
            self.selected = len - 1;
        }
        if len == 0 {
            self.selected = 0;
        }
    }
}

// ─── App state ──────────────────────────────────────────────────────────────

pub struct App {
    pub client: RosterClient,
    pub running: bool,

    // Data — owned by the backend; replaced wholesale on every reload.
    pub students: Vec<Student>,
    pub table: TableCursor,

    // Orchestration state
    pub modal: Modal,
    pub pending_csv: Option<PendingUpload>,

    // Search bar
    pub search_active: bool,
    pub search_input: String,
    /// Query the current table content answers; `None` means unfiltered.
    pub current_query: Option<String>,

    // Status
    pub status_message: String,
    pub loading: bool,
    pub needs_refresh: bool,
    pub synced_at: Option<DateTime<Utc>>,

    // Background task channels, polled each frame.
    pub fetch_rx: Option<oneshot::Receiver<FetchResult>>,
    pub edit_rx: Option<oneshot::Receiver<Result<Student, String>>>,
    pub preview_rx: Option<oneshot::Receiver<Result<PendingUpload, String>>>,
    pub action_rx: Option<oneshot::Receiver<ActionResult>>,

    // Incremented each frame; drives the loading spinner.
    pub frame_count: u64,
}

impl App {
    pub fn new(client: RosterClient) -> Self {
        Self {
            client,
            running: true,
            students: Vec::new(),
            table: TableCursor::new(),
            modal: Modal::Hidden,
            pending_csv: None,
            search_active: false,
            search_input: String::new(),
            current_query: None,
            status_message: "Loading...".into(),
            loading: true,
            needs_refresh: false,
            synced_at: None,
            fetch_rx: None,
            edit_rx: None,
            preview_rx: None,
            action_rx: None,
            frame_count: 0,
        }
    }

    pub fn selected_student(&self) -> Option<&Student> {
        self.students.get(self.table.selected)
    }

    // ── List / search ───────────────────────────────────────────────────

    /// Spawn a background list or search request. No-ops while one is
    /// already in flight.
    pub fn start_fetch(&mut self, query: Option<String>) {
        if self.fetch_rx.is_some() {
            return;
        }
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.fetch_rx = Some(rx);
        self.loading = true;
        self.status_message = match &query {
            Some(q) => format!("Searching for \"{q}\"…"),
            None => "Loading students…".into(),
        };
        tokio::spawn(async move {
            let outcome = match &query {
                Some(q) => client.search_students(q).await,
                None => client.list_students().await,
            };
            let result = match outcome {
                Ok(students) => FetchResult {
                    students,
                    query,
                    fetched_at: Utc::now(),
                    error: None,
                },
                Err(e) => FetchResult {
                    students: Vec::new(),
                    query,
                    fetched_at: Utc::now(),
                    error: Some(e.to_string()),
                },
            };
            let _ = tx.send(result);
        });
    }

    /// Run the queued post-mutation reload. The flag is only consumed once
    /// the fetch slot is free; while another request is still in flight the
    /// reload stays queued rather than being dropped.
    pub fn flush_refresh(&mut self) {
        if self.needs_refresh && self.fetch_rx.is_none() {
            self.needs_refresh = false;
            self.start_fetch(None);
        }
    }

    /// Check the fetch channel without blocking; apply the result when it
    /// has arrived. The table is replaced wholesale, never patched.
    pub fn poll_fetch_result(&mut self) -> bool {
        let result = match self.fetch_rx.as_mut() {
            None => return false,
            Some(rx) => match rx.try_recv() {
                Ok(r) => r,
                Err(oneshot::error::TryRecvError::Empty) => return false,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.fetch_rx = None;
                    return false;
                }
            },
        };
        self.fetch_rx = None;
        self.loading = false;

        if let Some(err) = result.error {
            tracing::warn!(%err, "fetch failed");
            self.status_message = format!("Load error: {err}");
            return true;
        }

        self.table.set_len(result.students.len());
        self.students = result.students;
        self.current_query = result.query;
        self.synced_at = Some(result.fetched_at);
        self.status_message = match &self.current_query {
            Some(q) => format!("{} students match \"{q}\".", self.students.len()),
            None => format!("{} students loaded.", self.students.len()),
        };
        true
    }

    /// Run the search bar's current input. Blank input behaves exactly like
    /// a full list load.
    pub fn submit_search(&mut self) {
        self.search_active = false;
        let query = normalize_query(&self.search_input).map(str::to_string);
        self.start_fetch(query);
    }

    // ── Add / edit ──────────────────────────────────────────────────────

    /// Open the form empty — the next save is a create.
    pub fn open_add_modal(&mut self) {
        self.modal = Modal::Editing {
            original: None,
            form: StudentForm::default(),
        };
    }

    /// Fetch the selected record and open the form populated from it. The
    /// fetched (pre-edit) roll becomes the update target.
    pub fn start_edit_selected(&mut self) {
        if self.edit_rx.is_some() {
            return;
        }
        let Some(roll) = self.selected_student().map(|s| s.roll) else {
            self.status_message = "No student selected.".into();
            return;
        };
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.edit_rx = Some(rx);
        tokio::spawn(async move {
            let result = client.get_student(roll).await.map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
    }

    pub fn poll_edit_result(&mut self) -> bool {
        let result = match self.edit_rx.as_mut() {
            None => return false,
            Some(rx) => match rx.try_recv() {
                Ok(r) => r,
                Err(oneshot::error::TryRecvError::Empty) => return false,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.edit_rx = None;
                    return false;
                }
            },
        };
        self.edit_rx = None;
        match result {
            Ok(student) => {
                self.modal = Modal::Editing {
                    original: Some(student.roll),
                    form: StudentForm::from_student(&student),
                };
            }
            Err(msg) => {
                // NotFound and friends: alert, no state change.
                self.status_message = msg;
            }
        }
        true
    }

    /// Validate the form and spawn the create or update request. Validation
    /// and server errors land back in the form; the modal stays open.
    pub fn save_student(&mut self) {
        if self.action_rx.is_some() {
            return;
        }
        let Modal::Editing { original, form } = &mut self.modal else {
            return;
        };
        let payload = match form.parse_inputs() {
            Ok(p) => p,
            Err(e) => {
                form.error = Some(e.to_string());
                return;
            }
        };
        form.error = None;
        let original = *original;
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.action_rx = Some(rx);
        tokio::spawn(async move {
            let (kind, outcome) = match original {
                // Update addresses the pre-edit roll; the body carries the
                // possibly-changed one.
                Some(old_roll) => (
                    ActionKind::Update,
                    client.update_student(old_roll, &payload).await.map(|s| {
                        format!("Student {} updated.", s.roll)
                    }),
                ),
                None => (
                    ActionKind::Create,
                    client.create_student(&payload).await.map(|s| {
                        format!("Student {} added.", s.roll)
                    }),
                ),
            };
            let _ = tx.send(ActionResult {
                kind,
                result: outcome.map_err(|e| e.to_string()),
            });
        });
    }

    // ── Delete ──────────────────────────────────────────────────────────

    pub fn request_delete_selected(&mut self) {
        let Some(student) = self.selected_student() else {
            self.status_message = "No student selected.".into();
            return;
        };
        self.modal = Modal::ConfirmDelete {
            roll: student.roll,
            name: student.name.clone(),
        };
    }

    pub fn confirm_delete(&mut self, roll: i64) {
        if self.action_rx.is_some() {
            return;
        }
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.action_rx = Some(rx);
        tokio::spawn(async move {
            let outcome = client
                .delete_student(roll)
                .await
                .map(|m| m.message.unwrap_or_else(|| "Student deleted.".into()))
                .map_err(|e| e.to_string());
            let _ = tx.send(ActionResult {
                kind: ActionKind::Delete,
                result: outcome,
            });
        });
    }

    pub fn confirm_delete_all(&mut self) {
        if self.action_rx.is_some() {
            return;
        }
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.action_rx = Some(rx);
        tokio::spawn(async move {
            let outcome = client
                .delete_all_students()
                .await
                .map(|m| m.message.unwrap_or_else(|| "All students deleted.".into()))
                .map_err(|e| e.to_string());
            let _ = tx.send(ActionResult {
                kind: ActionKind::DeleteAll,
                result: outcome,
            });
        });
    }

    // ── CSV upload ──────────────────────────────────────────────────────

    pub fn open_csv_prompt(&mut self) {
        self.modal = Modal::CsvPathPrompt {
            input: String::new(),
            error: None,
        };
    }

    /// Spawn a preview request for the given file. A success replaces any
    /// previous pending upload; zero parsed rows is an error.
    pub fn start_preview(&mut self, path: PathBuf) {
        if self.preview_rx.is_some() {
            return;
        }
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.preview_rx = Some(rx);
        self.status_message = format!("Previewing {}…", path.display());
        tokio::spawn(async move {
            let result = match client.preview_csv(&path).await {
                Ok(preview) => {
                    let total = preview.total_rows();
                    Ok(PendingUpload {
                        path,
                        message: preview.message.unwrap_or_else(|| {
                            format!("CSV parsed successfully! Found {total} rows.")
                        }),
                        total,
                        rows: preview.rows,
                        fields: preview.fields,
                    })
                }
                // EmptyCsv included: zero rows never opens the preview.
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(result);
        });
    }

    pub fn poll_preview_result(&mut self) -> bool {
        let result = match self.preview_rx.as_mut() {
            None => return false,
            Some(rx) => match rx.try_recv() {
                Ok(r) => r,
                Err(oneshot::error::TryRecvError::Empty) => return false,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.preview_rx = None;
                    return false;
                }
            },
        };
        self.preview_rx = None;
        match result {
            Ok(pending) => {
                self.status_message = pending.message.clone();
                self.pending_csv = Some(pending);
                self.modal = Modal::CsvPreview;
            }
            Err(msg) => {
                // Error state, never the preview modal.
                if let Modal::CsvPathPrompt { error, .. } = &mut self.modal {
                    *error = Some(msg);
                } else {
                    self.status_message = msg;
                }
            }
        }
        true
    }

    /// Discard the pending upload and clear the preview overlay.
    pub fn dismiss_preview(&mut self) {
        self.pending_csv = None;
        self.modal = Modal::Hidden;
    }

    /// Finalize the import: re-send the original file, then refresh the
    /// list after a short delay so the backend finishes processing.
    pub fn confirm_import(&mut self) {
        if self.action_rx.is_some() {
            return;
        }
        let Some(pending) = self.pending_csv.take() else {
            self.status_message = "No CSV to upload.".into();
            return;
        };
        self.modal = Modal::Hidden;
        self.status_message = format!("Importing {} rows…", pending.total);
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.action_rx = Some(rx);
        tokio::spawn(async move {
            let outcome = match client.import_csv(&pending.path).await {
                Ok(m) => {
                    // Give the backend a beat before the follow-up reload.
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    Ok(m
                        .message
                        .unwrap_or_else(|| "CSV uploaded successfully!".into()))
                }
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(ActionResult {
                kind: ActionKind::Import,
                result: outcome,
            });
        });
    }

    // ── Mutation results ────────────────────────────────────────────────

    /// Apply a completed mutation. Success closes the active modal and
    /// schedules a full reload; failure leaves the edit modal open with the
    /// error inline so the user can correct and resubmit.
    pub fn poll_action_result(&mut self) -> bool {
        let result = match self.action_rx.as_mut() {
            None => return false,
            Some(rx) => match rx.try_recv() {
                Ok(r) => r,
                Err(oneshot::error::TryRecvError::Empty) => return false,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.action_rx = None;
                    return false;
                }
            },
        };
        self.action_rx = None;
        match result.result {
            Ok(message) => {
                self.status_message = message;
                self.modal = Modal::Hidden;
                self.needs_refresh = true;
                if result.kind == ActionKind::DeleteAll {
                    self.pending_csv = None;
                }
            }
            Err(message) => {
                tracing::warn!(kind = ?result.kind, %message, "mutation failed");
                match (&mut self.modal, result.kind) {
                    (
                        Modal::Editing { form, .. },
                        ActionKind::Create | ActionKind::Update,
                    ) => {
                        form.error = Some(message);
                    }
                    _ => {
                        self.modal = Modal::Hidden;
                        self.status_message = message;
                    }
                }
            }
        }
        true
    }

    // ── Export ──────────────────────────────────────────────────────────

    /// Write the roster as the HTML table the original web panel renders.
    pub fn export_roster(&mut self) {
        let path = std::path::Path::new("roster.html");
        match crate::export::save_roster_html(path, &self.students) {
            Ok(()) => {
                self.status_message =
                    format!("Saved {} students to {}.", self.students.len(), path.display());
            }
            Err(e) => {
                tracing::warn!(%e, "export failed");
                self.status_message = format!("Export failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_app() -> App {
        App::new(RosterClient::new("http://localhost:5000").unwrap())
    }

    fn pending(total: usize) -> PendingUpload {
        let mut row = CsvRow::new();
        row.insert("roll".into(), json!(101));
        PendingUpload {
            path: "students.csv".into(),
            rows: vec![row],
            fields: vec!["roll".into()],
            total,
            message: "CSV parsed successfully!".into(),
        }
    }

    #[test]
    fn add_modal_opens_in_create_mode() {
        let mut app = test_app();
        app.open_add_modal();
        match &app.modal {
            Modal::Editing { original: None, form } => assert!(form.roll.is_empty()),
            other => panic!("unexpected modal: {other:?}"),
        }
    }

    #[test]
    fn fetch_result_replaces_table_wholesale() {
        let mut app = test_app();
        let (tx, rx) = oneshot::channel();
        app.fetch_rx = Some(rx);
        tx.send(FetchResult {
            students: vec![Student {
                roll: 101,
                name: "Asha".into(),
                age: Some(20),
                course: Some("CS".into()),
            }],
            query: None,
            fetched_at: Utc::now(),
            error: None,
        })
        .ok();
        assert!(app.poll_fetch_result());
        assert_eq!(app.students.len(), 1);
        assert_eq!(app.table.len, 1);
        assert!(!app.loading);
        assert!(app.current_query.is_none());
    }

    #[tokio::test]
    async fn queued_reload_survives_an_in_flight_fetch() {
        let mut app = test_app();
        let (tx, rx) = oneshot::channel();
        app.fetch_rx = Some(rx);
        app.needs_refresh = true;

        // The slot is occupied by a slow search; the reload must stay
        // queued instead of being consumed.
        app.flush_refresh();
        assert!(app.needs_refresh);

        tx.send(FetchResult {
            students: Vec::new(),
            query: Some("Asha".into()),
            fetched_at: Utc::now(),
            error: None,
        })
        .ok();
        assert!(app.poll_fetch_result());

        // Slot free again: the reload now starts and consumes the flag.
        app.flush_refresh();
        assert!(!app.needs_refresh);
        assert!(app.fetch_rx.is_some());
    }

    #[test]
    fn preview_success_stores_pending_and_opens_modal() {
        let mut app = test_app();
        let (tx, rx) = oneshot::channel();
        app.preview_rx = Some(rx);
        tx.send(Ok(pending(150))).ok();
        assert!(app.poll_preview_result());
        assert!(matches!(app.modal, Modal::CsvPreview));
        assert_eq!(app.pending_csv.as_ref().unwrap().total, 150);
    }

    #[test]
    fn preview_error_stays_in_prompt_with_inline_text() {
        let mut app = test_app();
        app.open_csv_prompt();
        let (tx, rx) = oneshot::channel();
        app.preview_rx = Some(rx);
        tx.send(Err("No valid rows found in CSV file".into())).ok();
        assert!(app.poll_preview_result());
        match &app.modal {
            Modal::CsvPathPrompt { error, .. } => {
                assert_eq!(error.as_deref(), Some("No valid rows found in CSV file"));
            }
            other => panic!("unexpected modal: {other:?}"),
        }
        assert!(app.pending_csv.is_none());
    }

    #[test]
    fn dismissing_the_preview_discards_the_pending_upload() {
        let mut app = test_app();
        app.pending_csv = Some(pending(3));
        app.modal = Modal::CsvPreview;
        app.dismiss_preview();
        assert!(app.pending_csv.is_none());
        assert!(app.modal.is_hidden());
    }

    #[test]
    fn a_new_preview_silently_replaces_the_pending_upload() {
        let mut app = test_app();
        app.pending_csv = Some(pending(3));
        let (tx, rx) = oneshot::channel();
        app.preview_rx = Some(rx);
        tx.send(Ok(pending(42))).ok();
        app.poll_preview_result();
        assert_eq!(app.pending_csv.as_ref().unwrap().total, 42);
    }

    #[test]
    fn successful_mutation_closes_modal_and_schedules_reload() {
        let mut app = test_app();
        app.open_add_modal();
        let (tx, rx) = oneshot::channel();
        app.action_rx = Some(rx);
        tx.send(ActionResult {
            kind: ActionKind::Create,
            result: Ok("Student 101 added.".into()),
        })
        .ok();
        assert!(app.poll_action_result());
        assert!(app.modal.is_hidden());
        assert!(app.needs_refresh);
        assert_eq!(app.status_message, "Student 101 added.");
    }

    #[test]
    fn failed_save_keeps_modal_open_with_error() {
        let mut app = test_app();
        app.open_add_modal();
        let (tx, rx) = oneshot::channel();
        app.action_rx = Some(rx);
        tx.send(ActionResult {
            kind: ActionKind::Create,
            result: Err("Student with this roll already exists".into()),
        })
        .ok();
        assert!(app.poll_action_result());
        match &app.modal {
            Modal::Editing { form, .. } => {
                assert_eq!(
                    form.error.as_deref(),
                    Some("Student with this roll already exists")
                );
            }
            other => panic!("unexpected modal: {other:?}"),
        }
        assert!(!app.needs_refresh);
    }

    #[test]
    fn delete_all_success_clears_pending_csv() {
        let mut app = test_app();
        app.pending_csv = Some(pending(3));
        let (tx, rx) = oneshot::channel();
        app.action_rx = Some(rx);
        tx.send(ActionResult {
            kind: ActionKind::DeleteAll,
            result: Ok("All 7 students deleted successfully".into()),
        })
        .ok();
        assert!(app.poll_action_result());
        assert!(app.pending_csv.is_none());
        assert!(app.needs_refresh);
    }

    #[test]
    fn edit_keeps_the_original_roll_while_the_form_changes() {
        let mut app = test_app();
        let (tx, rx) = oneshot::channel();
        app.edit_rx = Some(rx);
        tx.send(Ok(Student {
            roll: 101,
            name: "Asha".into(),
            age: Some(20),
            course: Some("CS".into()),
        }))
        .ok();
        assert!(app.poll_edit_result());
        match &mut app.modal {
            Modal::Editing { original, form } => {
                assert_eq!(*original, Some(101));
                form.roll.clear();
                form.roll.push_str("202");
                // The update target stays the pre-edit roll.
                assert_eq!(*original, Some(101));
            }
            other => panic!("unexpected modal: {other:?}"),
        }
    }

    #[test]
    fn edit_fetch_failure_leaves_state_unchanged() {
        let mut app = test_app();
        let (tx, rx) = oneshot::channel();
        app.edit_rx = Some(rx);
        tx.send(Err("Student not found".into())).ok();
        assert!(app.poll_edit_result());
        assert!(app.modal.is_hidden());
        assert_eq!(app.status_message, "Student not found");
    }

    #[test]
    fn cursor_clamps_at_both_ends() {
        let mut cursor = TableCursor::new();
        cursor.set_len(3);
        cursor.select_prev();
        assert_eq!(cursor.selected, 0);
        cursor.select_next();
        cursor.select_next();
        cursor.select_next();
        assert_eq!(cursor.selected, 2);
        cursor.set_len(1);
        assert_eq!(cursor.selected, 0);
    }
}
