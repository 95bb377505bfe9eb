use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::validation::FieldError;

/// Separate day, month and year text inputs as submitted by a GOV.UK date field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInput {
    pub day: String,
    pub month: String,
    pub year: String,
}

/// Form field the date belongs to, used for error anchors and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateField {
    pub name: &'static str,
    pub label: &'static str,
}

impl DateField {
    pub const REVOCATION: DateField = DateField {
        name: "revocationDate",
        label: "revocation date",
    };
    pub const ARREST: DateField = DateField {
        name: "returnToCustodyDate",
        label: "arrest date",
    };

    fn capitalised(&self) -> String {
        let mut chars = self.label.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn error(&self, message: String) -> FieldError {
        FieldError::new(self.name, message)
    }
}

impl DateInput {
    pub fn new(day: impl Into<String>, month: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            month: month.into(),
            year: year.into(),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(
            date.day().to_string(),
            date.month().to_string(),
            date.year().to_string(),
        )
    }

    /// Parses the three parts into a date no later than `today`.
    pub fn parse(&self, field: DateField, today: NaiveDate) -> Result<NaiveDate, FieldError> {
        let parts = [
            ("day", self.day.trim()),
            ("month", self.month.trim()),
            ("year", self.year.trim()),
        ];

        if parts.iter().all(|(_, value)| value.is_empty()) {
            return Err(field.error(format!("Enter the {}", field.label)));
        }

        if let Some((part, _)) = parts.iter().find(|(_, value)| value.is_empty()) {
            return Err(field.error(format!("{} must include a {part}", field.capitalised())));
        }

        let real_date = || field.error(format!("{} must be a real date", field.capitalised()));

        if parts
            .iter()
            .any(|(_, value)| !value.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(real_date());
        }
        if parts[2].1.len() != 4 {
            return Err(real_date());
        }

        let day = parts[0].1.parse::<u32>().map_err(|_| real_date())?;
        let month = parts[1].1.parse::<u32>().map_err(|_| real_date())?;
        let year = parts[2].1.parse::<i32>().map_err(|_| real_date())?;
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(real_date)?;

        if date > today {
            return Err(field.error(format!(
                "{} must be today or in the past",
                field.capitalised()
            )));
        }

        Ok(date)
    }
}

/// Formats a date the way caseworker-facing pages print them, e.g. `3 March 2024`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}
