use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use std::time::Duration;

use super::{App, Modal};

pub fn poll_event(timeout: Duration) -> anyhow::Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

pub fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // ── The active modal intercepts all keys while open ───────────────
    if !app.modal.is_hidden() {
        handle_modal_key(app, code);
        return;
    }

    // ── Search bar input mode ─────────────────────────────────────────
    if app.search_active {
        handle_search_key(app, code);
        return;
    }

    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            app.running = false;
            return;
        }
        _ => {}
    }

    match code {
        KeyCode::Down | KeyCode::Char('j') => app.table.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.table.select_prev(),
        KeyCode::Home | KeyCode::Char('g') => app.table.selected = 0,
        KeyCode::End | KeyCode::Char('G') => {
            if app.table.len > 0 {
                app.table.selected = app.table.len - 1;
            }
        }
        KeyCode::Char('a') => app.open_add_modal(),
        KeyCode::Char('e') | KeyCode::Enter => app.start_edit_selected(),
        KeyCode::Char('d') => app.request_delete_selected(),
        KeyCode::Char('D') => app.modal = Modal::ConfirmDeleteAll,
        KeyCode::Char('u') => app.open_csv_prompt(),
        KeyCode::Char('x') => app.export_roster(),
        KeyCode::Char('/') => {
            app.search_active = true;
            app.search_input.clear();
        }
        KeyCode::Char('r') if !app.loading => {
            app.needs_refresh = true;
        }
        _ => {}
    }
}

fn handle_search_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Enter => app.submit_search(),
        KeyCode::Esc => {
            app.search_active = false;
            app.search_input.clear();
        }
        KeyCode::Backspace => {
            app.search_input.pop();
        }
        KeyCode::Char(ch) if !ch.is_control() => {
            app.search_input.push(ch);
        }
        _ => {}
    }
}

fn handle_modal_key(app: &mut App, code: KeyCode) {
    match &mut app.modal {
        Modal::Hidden => {}

        Modal::Editing { form, .. } => match code {
            KeyCode::Esc => app.modal = Modal::Hidden,
            KeyCode::Enter => app.save_student(),
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        },

        Modal::ConfirmDelete { roll, .. } => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let roll = *roll;
                app.confirm_delete(roll);
            }
            KeyCode::Char('n') | KeyCode::Esc => app.modal = Modal::Hidden,
            _ => {}
        },

        Modal::ConfirmDeleteAll => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete_all(),
            KeyCode::Char('n') | KeyCode::Esc | KeyCode::Enter => {
                app.modal = Modal::Hidden;
            }
            _ => {}
        },

        Modal::CsvPathPrompt { input, error } => match code {
            KeyCode::Esc => app.modal = Modal::Hidden,
            KeyCode::Enter => {
                let path = input.trim().to_string();
                if path.is_empty() {
                    *error = Some("Enter the path of a CSV file.".into());
                } else {
                    app.start_preview(path.into());
                }
            }
            KeyCode::Backspace => {
                input.pop();
                *error = None;
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                input.push(ch);
                *error = None;
            }
            _ => {}
        },

        Modal::CsvPreview => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_import(),
            KeyCode::Char('n') | KeyCode::Esc => app.dismiss_preview(),
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RosterClient;
    use crate::models::Student;

    fn test_app() -> App {
        let mut app = App::new(RosterClient::new("http://localhost:5000").unwrap());
        app.students = vec![
            Student {
                roll: 101,
                name: "Asha".into(),
                age: Some(20),
                course: Some("CS".into()),
            },
            Student {
                roll: 102,
                name: "Ravi".into(),
                age: None,
                course: None,
            },
        ];
        app.table.set_len(2);
        app.loading = false;
        app
    }

    #[test]
    fn q_quits_only_outside_modals() {
        let mut app = test_app();
        app.open_add_modal();
        handle_key(&mut app, KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(app.running);
        handle_key(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        handle_key(&mut app, KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.running);
    }

    #[test]
    fn delete_asks_for_confirmation_with_the_selected_roll() {
        let mut app = test_app();
        app.table.selected = 1;
        handle_key(&mut app, KeyCode::Char('d'), KeyModifiers::NONE);
        match &app.modal {
            Modal::ConfirmDelete { roll, name } => {
                assert_eq!(*roll, 102);
                assert_eq!(name, "Ravi");
            }
            other => panic!("unexpected modal: {other:?}"),
        }
        // Declining leaves everything untouched.
        handle_key(&mut app, KeyCode::Char('n'), KeyModifiers::NONE);
        assert!(app.modal.is_hidden());
        assert_eq!(app.students.len(), 2);
    }

    #[test]
    fn modal_keys_feed_the_form() {
        let mut app = test_app();
        app.open_add_modal();
        for ch in "101".chars() {
            handle_key(&mut app, KeyCode::Char(ch), KeyModifiers::NONE);
        }
        handle_key(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        for ch in "Asha".chars() {
            handle_key(&mut app, KeyCode::Char(ch), KeyModifiers::NONE);
        }
        match &app.modal {
            Modal::Editing { form, .. } => {
                assert_eq!(form.roll, "101");
                assert_eq!(form.name, "Asha");
            }
            other => panic!("unexpected modal: {other:?}"),
        }
    }

    #[test]
    fn search_mode_collects_input_until_escape() {
        let mut app = test_app();
        handle_key(&mut app, KeyCode::Char('/'), KeyModifiers::NONE);
        assert!(app.search_active);
        for ch in "Asha".chars() {
            handle_key(&mut app, KeyCode::Char(ch), KeyModifiers::NONE);
        }
        assert_eq!(app.search_input, "Asha");
        handle_key(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(!app.search_active);
        assert!(app.search_input.is_empty());
    }

    #[test]
    fn dismissing_the_preview_clears_pending_state() {
        let mut app = test_app();
        app.pending_csv = Some(super::super::PendingUpload {
            path: "students.csv".into(),
            rows: Vec::new(),
            fields: Vec::new(),
            total: 3,
            message: String::new(),
        });
        app.modal = Modal::CsvPreview;
        handle_key(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.modal.is_hidden());
        assert!(app.pending_csv.is_none());
    }
}
