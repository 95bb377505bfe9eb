mod rules;

use std::fmt;

use serde::Serialize;

pub use rules::{
    check_return_to_custody, check_revocation_date, earliest_sentence_date,
    validate_court_case_selection, validate_journey, validate_recall_type,
    validate_return_to_custody, validate_revocation_date, JourneyContext, JourneyFailure,
    ReturnToCustody, ReturnToCustodyInput, RevocationContext,
};

/// Error message bound to a single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Ordered collection of field errors for one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(FieldError::new(field, message));
        errors
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn first_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .errors
            .iter()
            .map(|error| error.message.as_str())
            .collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
