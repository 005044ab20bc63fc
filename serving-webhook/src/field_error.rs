//! Validation errors addressed by paths into the object graph.
//!
//! A [`FieldError`] carries one message and every path it applies to. Errors
//! are collected into [`FieldErrors`], which merges entries that share a
//! message so a caller sees each kind of problem once, with all its paths.

use std::fmt;

/// Path used by a value to refer to itself before a parent prefixes it
pub const CURRENT_FIELD: &str = "";

const MISSING_FIELDS: &str = "missing field(s)";
const DISALLOWED_FIELDS: &str = "must not set the field(s)";

/// A validation failure shared by one or more field paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Human readable description of the failure
    pub message: String,
    /// Dot separated paths the failure applies to, in declaration order
    pub paths: Vec<String>,
    /// Optional longer explanation, rendered on its own line
    pub details: Option<String>,
}

impl FieldError {
    pub fn new<I>(message: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            message: message.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            details: None,
        }
    }

    /// Required fields that hold their zero value
    pub fn missing_field<I>(paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::new(MISSING_FIELDS, paths)
    }

    /// Fields the caller is not allowed to set
    pub fn disallowed_fields<I>(paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::new(DISALLOWED_FIELDS, paths)
    }

    pub fn invalid_value(value: impl fmt::Display, path: impl Into<String>) -> Self {
        Self::new(format!("invalid value {:?}", value.to_string()), [path])
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Nests every path under `prefix`
    ///
    /// A path equal to [`CURRENT_FIELD`] becomes the prefix itself.
    #[must_use]
    pub fn via_field(mut self, prefix: &str) -> Self {
        for path in &mut self.paths {
            *path = if path.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{path}")
            };
        }
        self
    }

    /// Combines two errors into one aggregate
    pub fn also(self, other: FieldError) -> FieldErrors {
        let mut errors = FieldErrors::from(self);
        errors.push(other);
        errors
    }

    fn merges_with(&self, other: &FieldError) -> bool {
        self.message == other.message && self.details == other.details
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.paths.is_empty() {
            write!(f, ": {}", self.paths.join(", "))?;
        }
        if let Some(details) = &self.details {
            write!(f, "\n{details}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// An ordered aggregate of field errors
///
/// Pushing an error whose message matches an existing entry appends its paths
/// to that entry instead of adding a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        match self.errors.iter_mut().find(|entry| entry.merges_with(&error)) {
            Some(entry) => {
                for path in error.paths {
                    if !entry.paths.contains(&path) {
                        entry.paths.push(path);
                    }
                }
            }
            None => self.errors.push(error),
        }
    }

    /// Collects the failures of a nested validation, nested under `prefix`
    pub fn extend_via(&mut self, prefix: &str, result: Result<(), FieldErrors>) {
        if let Err(errors) = result {
            self.extend(errors.via_field(prefix));
        }
    }

    #[must_use]
    pub fn via_field(self, prefix: &str) -> Self {
        self.errors
            .into_iter()
            .map(|error| error.via_field(prefix))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// `Ok` when nothing was collected
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<FieldError> for FieldErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl Extend<FieldError> for FieldErrors {
    fn extend<T: IntoIterator<Item = FieldError>>(&mut self, iter: T) {
        for error in iter {
            self.push(error);
        }
    }
}

impl FromIterator<FieldError> for FieldErrors {
    fn from_iter<T: IntoIterator<Item = FieldError>>(iter: T) -> Self {
        let mut errors = Self::new();
        errors.extend(iter);
        errors
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.errors.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}
