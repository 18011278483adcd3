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

use crate::{
    parser::form::{self, MultipartForm},
    ConvertError, ConvertResult, Converter, ConverterId, Payload, Rfc5322, Rule, ValidationErrors,
};
use smtpgate_common::{Message, SeekableBuffer};
use std::io::{Read, Seek};

/// Identifier of the [`Mailgun`] converter.
pub const MAILGUN_ID: &str = "mailgun";

/// Default size ceiling of a Mailgun form: 25 MiB.
pub const DEFAULT_SIZE_LIMIT: usize = 25 * 1024 * 1024;

const MESSAGE_FIELD: &str = "message";
const TO_FIELD: &str = "to";

/// Split every entry on commas, dropping empty addresses.
fn flatten_emails(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Mailgun MIME submission: a `to` field and a `message` file holding the
/// raw email.
pub struct Mailgun {
    rfc5322: std::sync::Arc<dyn Converter>,
    size_limit: usize,
}

impl std::fmt::Debug for Mailgun {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailgun")
            .field("rfc5322", &self.rfc5322.id())
            .field("size_limit", &self.size_limit)
            .finish()
    }
}

impl Default for Mailgun {
    #[inline]
    fn default() -> Self {
        Self::new(std::sync::Arc::new(Rfc5322::new()))
    }
}

impl Mailgun {
    /// Create the converter with the default size ceiling, `rfc5322` parses
    /// the attached message.
    #[inline]
    #[must_use]
    pub fn new(rfc5322: std::sync::Arc<dyn Converter>) -> Self {
        Self {
            rfc5322,
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }

    /// Change the size ceiling of the form, in bytes.
    #[inline]
    #[must_use]
    pub const fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    fn read_limited(&self, mut body: Box<dyn SeekableBuffer>) -> ConvertResult<Vec<u8>> {
        let mut raw = Vec::new();
        body.by_ref()
            .take(self.size_limit as u64 + 1)
            .read_to_end(&mut raw)?;

        if raw.len() > self.size_limit {
            return Err(ConvertError::SizeLimit {
                limit: self.size_limit,
            });
        }
        Ok(raw)
    }

    fn validate(to: &[String]) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if to.is_empty() {
            errors.push(TO_FIELD, Rule::Min(1));
        }
        for (idx, value) in to.iter().enumerate() {
            if value.trim().is_empty() {
                errors.push(format!("{TO_FIELD}[{idx}]"), Rule::Required);
            }
        }
        errors.into_result()
    }
}

impl Converter for Mailgun {
    #[inline]
    fn id(&self) -> ConverterId {
        ConverterId::from(MAILGUN_ID)
    }

    #[inline]
    #[tracing::instrument(name = "mailgun", skip_all, err)]
    fn convert(&self, payload: Payload) -> ConvertResult<Message> {
        let boundary = form::boundary(payload.content_type())?;
        let raw = self.read_limited(payload.into_body())?;
        let mut form = MultipartForm::parse(&raw, &boundary)?;

        let Some(file) = form.take_file(MESSAGE_FIELD) else {
            return Err(ConvertError::NonMimeNotImplemented);
        };
        let to = form.values(TO_FIELD);
        Self::validate(to)?;

        let parsed = self.rfc5322.convert(Payload::from_bytes(file))?;
        let from = parsed.from().to_owned();
        let mut body = parsed.into_raw();
        body.rewind()?;

        let recipients = flatten_emails(to);
        tracing::debug!(%from, recipients = recipients.len(), "Form converted.");

        Ok(Message::new(from, recipients, vec![], vec![], body))
    }
}
