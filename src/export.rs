use anyhow::{Context, Result};
use std::path::Path;

use crate::models::Student;

/// Replace the five HTML-significant characters with named entities.
/// Ampersand goes first so entities introduced by the later substitutions
/// are not double-escaped.
pub fn escape_html(unsafe_text: &str) -> String {
    unsafe_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Render the roster as the HTML table the original web panel shows: one row
/// per student with roll, escaped name, age-or-empty, escaped course-or-empty
/// and per-row controls tagged with the record's roll.
pub fn roster_html(students: &[Student]) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Student Roster</title>\n</head>\n<body>\n");
    out.push_str("<h1>Student Roster</h1>\n");
    out.push_str("<table id=\"studentsTable\" border=\"1\">\n");
    out.push_str("<thead><tr><th>Roll</th><th>Name</th><th>Age</th><th>Course</th><th>Actions</th></tr></thead>\n");
    out.push_str("<tbody>\n");
    for s in students {
        let age = s.age.map(|a| a.to_string()).unwrap_or_default();
        let course = escape_html(s.course.as_deref().unwrap_or(""));
        out.push_str(&format!(
            "<tr><td>{roll}</td><td>{name}</td><td>{age}</td><td>{course}</td>\
             <td><button class=\"edit-btn\" data-roll=\"{roll}\">Update</button> \
             <button class=\"delete-btn\" data-roll=\"{roll}\">Delete</button></td></tr>\n",
            roll = s.roll,
            name = escape_html(&s.name),
        ));
    }
    out.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    out
}

/// Write the roster table to disk and return the path for the status bar.
pub fn save_roster_html(path: &Path, students: &[Student]) -> Result<()> {
    std::fs::write(path, roster_html(students))
        .with_context(|| format!("Failed to write {}", path.display()))
}
