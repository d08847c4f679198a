use anyhow::{anyhow, Context, Result};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::models::{Student, StudentPayload};

/// Fields of the add/edit student form, in focus order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum StudentField {
    #[default]
    Roll,
    Name,
    Age,
    Course,
}

impl StudentField {
    const ALL: [StudentField; 4] = [
        StudentField::Roll,
        StudentField::Name,
        StudentField::Age,
        StudentField::Course,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StudentField::Roll => "Roll",
            StudentField::Name => "Name",
            StudentField::Age => "Age",
            StudentField::Course => "Course",
        }
    }

    fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Text buffers behind the student modal. All four fields are plain strings
/// until `parse_inputs` turns them into a typed payload.
#[derive(Debug, Clone, Default)]
pub struct StudentForm {
    pub roll: String,
    pub name: String,
    pub age: String,
    pub course: String,
    pub active: StudentField,
    /// Validation or server error shown inline; the modal stays open.
    pub error: Option<String>,
}

impl StudentForm {
    /// Populate the form from a freshly fetched record when editing.
    pub fn from_student(s: &Student) -> Self {
        Self {
            roll: s.roll.to_string(),
            name: s.name.clone(),
            age: s.age.map(|a| a.to_string()).unwrap_or_default(),
            course: s.course.clone().unwrap_or_default(),
            active: StudentField::Roll,
            error: None,
        }
    }

    pub fn focus_next(&mut self) {
        self.active = self.active.next();
    }

    pub fn focus_prev(&mut self) {
        self.active = self.active.prev();
    }

    /// Append a character to the active field. Roll and age are numeric.
    pub fn push_char(&mut self, ch: char) -> bool {
        match self.active {
            StudentField::Roll => {
                if ch.is_ascii_digit() {
                    self.roll.push(ch);
                    true
                } else {
                    false
                }
            }
            StudentField::Age => {
                if ch.is_ascii_digit() {
                    self.age.push(ch);
                    true
                } else {
                    false
                }
            }
            StudentField::Name => {
                if !ch.is_control() {
                    self.name.push(ch);
                    true
                } else {
                    false
                }
            }
            StudentField::Course => {
                if !ch.is_control() {
                    self.course.push(ch);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn backspace(&mut self) {
        match self.active {
            StudentField::Roll => {
                self.roll.pop();
            }
            StudentField::Name => {
                self.name.pop();
            }
            StudentField::Age => {
                self.age.pop();
            }
            StudentField::Course => {
                self.course.pop();
            }
        }
    }

    /// Validate the buffers and build the request body. Age and course are
    /// optional; a blank age becomes null rather than zero.
    pub fn parse_inputs(&self) -> Result<StudentPayload> {
        let roll_raw = self.roll.trim();
        if roll_raw.is_empty() {
            return Err(anyhow!("Roll number is required."));
        }
        let roll = roll_raw
            .parse::<i64>()
            .context("Roll number must be an integer.")?;

        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Name is required."));
        }

        let age_raw = self.age.trim();
        let age = if age_raw.is_empty() {
            None
        } else {
            Some(age_raw.parse::<i64>().context("Age must be an integer.")?)
        };

        Ok(StudentPayload {
            roll,
            name: name.to_string(),
            age,
            course: self.course.trim().to_string(),
        })
    }

    /// One rendered line per field, highlighting the focused one.
    pub fn build_line(&self, field: StudentField) -> Line<'static> {
        let value = match field {
            StudentField::Roll => &self.roll,
            StudentField::Name => &self.name,
            StudentField::Age => &self.age,
            StudentField::Course => &self.course,
        };
        let is_active = self.active == field;

        let placeholder = match field {
            StudentField::Roll | StudentField::Name => "<required>",
            StudentField::Age | StudentField::Course => "<optional>",
        };
        let display = if value.is_empty() {
            placeholder.to_string()
        } else {
            value.clone()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("  {:<7}", format!("{}:", field.label()))),
            Span::styled(display, style),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_and_age_accept_digits_only() {
        let mut form = StudentForm::default();
        assert!(form.push_char('1'));
        assert!(!form.push_char('x'));
        form.active = StudentField::Age;
        assert!(form.push_char('2'));
        assert!(!form.push_char('-'));
        assert_eq!(form.roll, "1");
        assert_eq!(form.age, "2");
    }

    #[test]
    fn parse_requires_roll_and_name() {
        let mut form = StudentForm::default();
        assert!(form.parse_inputs().is_err());
        form.roll = "101".into();
        assert!(form.parse_inputs().is_err());
        form.name = "  Asha  ".into();
        let payload = form.parse_inputs().unwrap();
        assert_eq!(payload.roll, 101);
        assert_eq!(payload.name, "Asha");
        assert_eq!(payload.age, None);
        assert_eq!(payload.course, "");
    }

    #[test]
    fn parse_keeps_optional_age_and_course() {
        let form = StudentForm {
            roll: "101".into(),
            name: "Asha".into(),
            age: "20".into(),
            course: " CS ".into(),
            ..Default::default()
        };
        let payload = form.parse_inputs().unwrap();
        assert_eq!(payload.age, Some(20));
        assert_eq!(payload.course, "CS");
    }

    #[test]
    fn from_student_round_trips_the_record() {
        let s = Student {
            roll: 7,
            name: "Ravi".into(),
            age: None,
            course: Some("Math".into()),
        };
        let form = StudentForm::from_student(&s);
        assert_eq!(form.roll, "7");
        assert_eq!(form.age, "");
        assert_eq!(form.course, "Math");
        let payload = form.parse_inputs().unwrap();
        assert_eq!(payload.roll, 7);
        assert_eq!(payload.age, None);
    }

    #[test]
    fn focus_cycles_through_all_fields() {
        let mut form = StudentForm::default();
        form.focus_next();
        assert_eq!(form.active, StudentField::Name);
        form.focus_next();
        form.focus_next();
        form.focus_next();
        assert_eq!(form.active, StudentField::Roll);
        form.focus_prev();
        assert_eq!(form.active, StudentField::Course);
    }
}
