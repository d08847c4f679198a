use crate::models::{cell_text, CsvRow};

/// Most data rows shown in the preview modal. The full row set is kept in
/// the pending upload for the import count report.
pub const PREVIEW_ROW_CAP: usize = 100;

/// Materialize the preview cells: one Vec per data row, one String per field,
/// missing cells rendered empty. Capped at `PREVIEW_ROW_CAP`.
pub fn preview_grid(rows: &[CsvRow], fields: &[String]) -> Vec<Vec<String>> {
    rows.iter()
        .take(PREVIEW_ROW_CAP)
        .map(|row| fields.iter().map(|f| cell_text(row.get(f))).collect())
        .collect()
}

/// Summary row text when the preview was truncated, `None` otherwise.
pub fn preview_summary(shown: usize, total: usize) -> Option<String> {
    if total > shown {
        Some(format!("Showing {shown} of {total} rows"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(roll: i64, name: &str) -> CsvRow {
        let mut r = CsvRow::new();
        r.insert("roll".into(), json!(roll));
        r.insert("name".into(), json!(name));
        r
    }

    fn fields() -> Vec<String> {
        vec!["roll".into(), "name".into(), "age".into()]
    }

    #[test]
    fn grid_follows_field_order_and_fills_missing_cells() {
        let rows = vec![row(101, "Asha")];
        let grid = preview_grid(&rows, &fields());
        assert_eq!(grid, vec![vec!["101".to_string(), "Asha".into(), "".into()]]);
    }

    #[test]
    fn grid_caps_at_one_hundred_rows() {
        let rows: Vec<CsvRow> = (0..150).map(|i| row(i, "x")).collect();
        let grid = preview_grid(&rows, &fields());
        assert_eq!(grid.len(), PREVIEW_ROW_CAP);
    }

    #[test]
    fn summary_reports_truncation() {
        assert_eq!(
            preview_summary(100, 150).as_deref(),
            Some("Showing 100 of 150 rows")
        );
        assert_eq!(preview_summary(42, 42), None);
        assert_eq!(preview_summary(100, 100), None);
    }
}
