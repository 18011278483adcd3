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

use crate::ConvertError;
use smtpgate_common::{Message, SeekableBuffer};

/// Result of a conversion.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Stable identifier of a converter, used to select it from a [`crate::Registry`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ConverterId(String);

impl ConverterId {
    /// Create an identifier.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    ///
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConverterId {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for ConverterId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConverterId {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Input of a converter: the submitted body and its declared content type.
pub struct Payload {
    content_type: Option<String>,
    body: Box<dyn SeekableBuffer>,
}

impl std::fmt::Debug for Payload {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl Payload {
    /// Wrap a body without content type.
    #[inline]
    #[must_use]
    pub fn new(body: impl SeekableBuffer + 'static) -> Self {
        Self {
            content_type: None,
            body: Box::new(body),
        }
    }

    /// Wrap an in-memory body.
    #[inline]
    #[must_use]
    pub fn from_bytes(body: impl Into<Vec<u8>>) -> Self {
        Self::new(std::io::Cursor::new(body.into()))
    }

    /// Set the declared content type (`Content-Type` of the submission).
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    ///
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Consume the payload and return its body.
    #[inline]
    #[must_use]
    pub fn into_body(self) -> Box<dyn SeekableBuffer> {
        self.body
    }
}

/// Turn one provider payload shape into a canonical [`Message`].
///
/// Implementations are stateless after construction and shared between
/// concurrent submissions.
pub trait Converter: Send + Sync {
    /// Identifier under which the converter is registered.
    fn id(&self) -> ConverterId;

    /// Produce a message out of the payload.
    ///
    /// # Errors
    ///
    /// * the payload is malformed or fails validation
    /// * the payload is valid but its format is not supported
    fn convert(&self, payload: Payload) -> ConvertResult<Message>;
}
