/*
 * vSMTP mail transfer agent
 * Copyright (C) 2022 viridIT SAS
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/

use crate::parser::{form::FormError, headers::HeaderError};
use smtpgate_common::ErrorClass;

/// Validation rule a field failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Rule {
    /// The field is absent or empty.
    Required,
    /// The list has less elements than the minimum.
    Min(usize),
    /// The value is not a valid email address.
    Email,
}

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the field in the payload, `recipients[0].address.email` for instance.
    pub field: String,
    ///
    pub rule: Rule,
}

impl FieldError {
    /// Create a field error.
    #[inline]
    #[must_use]
    pub fn new(field: impl Into<String>, rule: Rule) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }
}

impl std::fmt::Display for FieldError {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.rule {
            Rule::Min(min) => write!(
                f,
                "field '{}' failed on the 'min' rule (at least {min})",
                self.field
            ),
            rule => write!(f, "field '{}' failed on the '{rule}' rule", self.field),
        }
    }
}

/// Every field of a payload that failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Record a failing field.
    #[inline]
    pub fn push(&mut self, field: impl Into<String>, rule: Rule) {
        self.0.push(FieldError::new(field, rule));
    }

    ///
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// * at least one field failed
    #[inline]
    pub fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("validation failed: ")?;
        for (idx, error) in self.0.iter().enumerate() {
            if idx != 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Error produced by a converter.
#[allow(clippy::module_name_repetitions)]
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The embedded message is not RFC 5322 compliant.
    #[error("failed to parse input: {0}")]
    Parse(#[from] HeaderError),
    /// The payload could not be read.
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    /// The payload is not valid JSON, or does not match the schema.
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The multipart form is malformed.
    #[error("malformed multipart form: {0}")]
    Form(#[from] FormError),
    /// Fields failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    /// The payload is bigger than the accepted size.
    #[error("message size exceeds the limit of {limit} bytes")]
    SizeLimit {
        /// accepted size, in bytes
        limit: usize,
    },
    /// `SparkPost` transmission without embedded RFC 822 content.
    #[error("inline content transmission not implemented")]
    InlineContentNotImplemented,
    /// Mailgun submission without a `message` file.
    #[error("non-mime format not implemented")]
    NonMimeNotImplemented,
}

impl ConvertError {
    /// Category of the error.
    #[inline]
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InlineContentNotImplemented | Self::NonMimeNotImplemented => {
                ErrorClass::Unsupported
            }
            _ => ErrorClass::Validation,
        }
    }
}
