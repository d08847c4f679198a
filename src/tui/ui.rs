use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

use super::form::StudentField;
use super::preview::{preview_grid, preview_summary};
use super::{App, Modal};
use chrono::Local;

const ACCENT: Color = Color::Cyan;
const HEADER_BG: Color = Color::DarkGray;
const SELECTED_BG: Color = Color::Rgb(40, 40, 60);
const DIM: Color = Color::DarkGray;
const WARN: Color = Color::Yellow;
const BAD: Color = Color::Red;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

// ─── Main render ────────────────────────────────────────────────────────────

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_clock(f, chunks[0]);
    render_table(f, app, chunks[1]);
    render_status_bar(f, app, chunks[2]);

    let full = f.area();
    match &app.modal {
        Modal::Hidden => {}
        Modal::Editing { original, form } => {
            render_edit_modal(f, *original, form, full);
        }
        Modal::ConfirmDelete { roll, name } => {
            render_confirm_delete(f, *roll, name, full);
        }
        Modal::ConfirmDeleteAll => render_confirm_delete_all(f, full),
        Modal::CsvPathPrompt { input, error } => {
            render_csv_prompt(f, input, error.as_deref(), full);
        }
        Modal::CsvPreview => render_csv_preview(f, app, full),
    }
}

// ─── Header / search bar ────────────────────────────────────────────────────

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let search = if app.search_active {
        Line::from(vec![
            Span::styled(" Search: ", Style::default().fg(WARN)),
            Span::raw(app.search_input.clone()),
            Span::styled("▏", Style::default().fg(WARN)),
        ])
    } else {
        match &app.current_query {
            Some(q) => Line::from(vec![
                Span::styled(" Filter: ", Style::default().fg(DIM)),
                Span::styled(q.clone(), Style::default().fg(WARN)),
                Span::styled("  (/ then Enter on a blank query clears)", Style::default().fg(DIM)),
            ]),
            None => Line::from(Span::styled(
                " / to search",
                Style::default().fg(DIM),
            )),
        }
    };

    let header = Paragraph::new(search).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .title(" Student Roster ")
            .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    );
    f.render_widget(header, area);
}

fn render_clock(f: &mut Frame, tab_area: Rect) {
    let time_str = format!(" {} ", Local::now().format("%a %b %d  %H:%M:%S"));
    let clock_width = time_str.len() as u16;
    let clock_area = Rect {
        x: tab_area.right().saturating_sub(clock_width),
        y: tab_area.y,
        width: clock_width.min(tab_area.width),
        height: 1,
    };
    f.render_widget(
        Paragraph::new(time_str).style(Style::default().fg(ACCENT)),
        clock_area,
    );
}

// ─── Roster table ───────────────────────────────────────────────────────────

fn render_table(f: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.loading {
        let spin = SPINNER[(app.frame_count / 2) as usize % SPINNER.len()];
        format!(" Students {spin} ")
    } else {
        format!(" Students ({}) ", app.students.len())
    };

    if app.students.is_empty() && !app.loading {
        let msg = Paragraph::new("  No students found. Press a to add one or u to import a CSV.")
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_style(Style::default().fg(ACCENT)),
            );
        f.render_widget(msg, area);
        return;
    }

    let header = Row::new(vec!["Roll", "Name", "Age", "Course"])
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    // The full row set is rebuilt every frame; nothing is patched in place.
    let rows: Vec<Row> = app
        .students
        .iter()
        .map(|s| {
            Row::new(vec![
                s.roll.to_string(),
                s.name.clone(),
                s.age.map(|a| a.to_string()).unwrap_or_default(),
                s.course.clone().unwrap_or_default(),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Percentage(40),
            Constraint::Length(6),
            Constraint::Percentage(40),
        ],
    )
    .header(header)
    .row_highlight_style(Style::default().bg(SELECTED_BG).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ")
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(Style::default().fg(ACCENT)),
    );

    app.table.inner.select(Some(app.table.selected));
    f.render_stateful_widget(table, area, &mut app.table.inner);
}

// ─── Status bar ─────────────────────────────────────────────────────────────

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let sync_hint = app
        .synced_at
        .map(|t| format!("  synced {}", t.with_timezone(&Local).format("%H:%M:%S")))
        .unwrap_or_default();

    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(
            &app.status_message,
            Style::default().fg(if app.loading { WARN } else { Color::White }),
        ),
        Span::styled(
            format!(
                "  q:quit  a:add  e:edit  d:delete  D:delete-all  u:csv  /:search  x:export  r:refresh{}  ",
                sync_hint
            ),
            Style::default().fg(DIM),
        ),
    ]))
    .style(Style::default().bg(HEADER_BG));

    f.render_widget(status, area);
}

// ─── Modals ─────────────────────────────────────────────────────────────────

fn render_edit_modal(f: &mut Frame, original: Option<i64>, form: &super::form::StudentForm, area: Rect) {
    let popup = centered_rect(50, 40, area);
    f.render_widget(Clear, popup);

    let title = match original {
        Some(roll) => format!(" Update Student (roll {roll}) "),
        None => " Add Student ".to_string(),
    };

    let mut lines = vec![
        Line::from(""),
        form.build_line(StudentField::Roll),
        form.build_line(StudentField::Name),
        form.build_line(StudentField::Age),
        form.build_line(StudentField::Course),
        Line::from(""),
    ];
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(
            format!("  {err}"),
            Style::default().fg(BAD),
        )));
    }
    lines.push(Line::from(Span::styled(
        "  Tab:next field  Enter:save  Esc:cancel",
        Style::default().fg(DIM),
    )));

    let body = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    );
    f.render_widget(body, popup);
}

fn render_confirm_delete(f: &mut Frame, roll: i64, name: &str, area: Rect) {
    let popup = centered_rect(44, 20, area);
    f.render_widget(Clear, popup);

    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(format!("  Delete student with roll {roll} ({name})?")),
        Line::from(""),
        Line::from(Span::styled(
            "  y:delete  n:cancel",
            Style::default().fg(DIM),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Confirm Delete ")
            .title_style(Style::default().fg(BAD).add_modifier(Modifier::BOLD)),
    );
    f.render_widget(body, popup);
}

fn render_confirm_delete_all(f: &mut Frame, area: Rect) {
    let popup = centered_rect(56, 24, area);
    f.render_widget(Clear, popup);

    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Delete ALL students and CSV imports?",
            Style::default().fg(BAD).add_modifier(Modifier::BOLD),
        )),
        Line::from("  This action cannot be undone."),
        Line::from(""),
        Line::from(Span::styled(
            "  y:delete everything  n:cancel",
            Style::default().fg(DIM),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Confirm Delete All ")
            .title_style(Style::default().fg(BAD).add_modifier(Modifier::BOLD)),
    );
    f.render_widget(body, popup);
}

fn render_csv_prompt(f: &mut Frame, input: &str, error: Option<&str>, area: Rect) {
    let popup = centered_rect(60, 24, area);
    f.render_widget(Clear, popup);

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("  File: "),
            Span::styled(input.to_string(), Style::default().fg(WARN)),
            Span::styled("▏", Style::default().fg(WARN)),
        ]),
        Line::from(""),
    ];
    if let Some(err) = error {
        lines.push(Line::from(Span::styled(
            format!("  {err}"),
            Style::default().fg(BAD),
        )));
    }
    lines.push(Line::from(Span::styled(
        "  Enter:preview  Esc:cancel",
        Style::default().fg(DIM),
    )));

    let body = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Import CSV ")
            .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    );
    f.render_widget(body, popup);
}

fn render_csv_preview(f: &mut Frame, app: &App, area: Rect) {
    let Some(pending) = &app.pending_csv else {
        return;
    };

    let popup = centered_rect(80, 80, area);
    f.render_widget(Clear, popup);

    let grid = preview_grid(&pending.rows, &pending.fields);
    let summary = preview_summary(grid.len(), pending.total);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(if summary.is_some() { 1 } else { 0 }),
            Constraint::Length(1),
        ])
        .margin(1)
        .split(popup);

    f.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title(" CSV Preview ")
            .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        popup,
    );

    f.render_widget(
        Paragraph::new(Span::styled(
            format!(" {}", pending.message),
            Style::default().fg(WARN),
        )),
        chunks[0],
    );

    let header = Row::new(pending.fields.clone())
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = grid.into_iter().map(Row::new).collect();
    let widths = vec![
        Constraint::Ratio(1, pending.fields.len().max(1) as u32);
        pending.fields.len().max(1)
    ];
    f.render_widget(Table::new(rows, widths).header(header), chunks[1]);

    // Spans the whole popup width rather than a single table column.
    if let Some(summary) = summary {
        f.render_widget(
            Paragraph::new(Span::styled(
                format!(" {summary}"),
                Style::default().fg(DIM).add_modifier(Modifier::ITALIC),
            )),
            chunks[2],
        );
    }

    f.render_widget(
        Paragraph::new(Span::styled(
            " y:import  n:cancel",
            Style::default().fg(DIM),
        )),
        chunks[3],
    );
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RosterClient;
    use crate::models::CsvRow;
    use crate::tui::PendingUpload;
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    fn buffer_lines(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buf = terminal.backend().buffer();
        (0..buf.area.height)
            .map(|y| {
                (0..buf.area.width)
                    .map(|x| buf[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn preview_summary_spans_the_popup_not_one_column() {
        let mut app = App::new(RosterClient::new("http://localhost:5000").unwrap());
        let rows: Vec<CsvRow> = (0..150)
            .map(|i| {
                let mut r = CsvRow::new();
                r.insert("roll".into(), json!(i));
                r
            })
            .collect();
        app.pending_csv = Some(PendingUpload {
            path: "students.csv".into(),
            rows,
            fields: vec!["roll".into(), "name".into(), "age".into(), "course".into()],
            total: 150,
            message: "CSV parsed successfully! Found 150 rows.".into(),
        });
        app.modal = Modal::CsvPreview;
        app.loading = false;

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();

        // Four fields split the popup into ~19-column cells; the summary
        // must still come through whole, not clipped to one cell.
        let lines = buffer_lines(&terminal);
        assert!(
            lines.iter().any(|l| l.contains("Showing 100 of 150 rows")),
            "summary line missing or clipped:\n{}",
            lines.join("\n")
        );
    }
}
