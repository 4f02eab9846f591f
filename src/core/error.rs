use thiserror::Error;

/// Errors that can occur while running the scheduling and billing engine.
///
/// Expected business conditions (duplicate invoices for a month, nothing to
/// generate, unresolved building references) are not errors; they are
/// reported through the run summaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Run parameters or a record failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A calendar month or date could not be constructed.
    #[error("period error: {0}")]
    Period(String),

    /// Invoice amounts are inconsistent.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A store collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by store collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write violated a uniqueness constraint.
    #[error("duplicate {collection} record: {key}")]
    Duplicate {
        /// Collection the write targeted ("invoices", "jobs").
        collection: &'static str,
        /// Human-readable form of the conflicting key.
        key: String,
    },

    /// An update referenced a record that does not exist.
    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// Reading or writing a store snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "vehicle.registration_no").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Rule identifier if applicable (e.g. "BAL-02").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error with a rule ID.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}
