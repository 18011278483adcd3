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

use crate::{ConvertResult, Converter, ConverterId, Payload, Rfc5322, Rule, ValidationErrors};
use smtpgate_common::{Address, Message, SeekableBuffer};
use std::io::Seek;

/// Identifier of the [`SparkPost`] converter.
pub const SPARKPOST_ID: &str = "sparkpost";

/// `SparkPost` transmission envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Transmission {
    /// Envelope recipients, authoritative over the message headers.
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    ///
    #[serde(default)]
    pub content: Option<Content>,
}

///
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Recipient {
    ///
    #[serde(default)]
    pub address: RecipientAddress,
}

///
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct RecipientAddress {
    ///
    #[serde(default)]
    pub email: String,
}

/// Content of the transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Content {
    /// Complete RFC 822 message, empty for inline content.
    #[serde(default)]
    pub email_rfc822: String,
}

impl Transmission {
    /// Check the envelope and report every failing field.
    ///
    /// # Errors
    ///
    /// * no recipient, a recipient without a valid email, or no content
    #[inline]
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.recipients.is_empty() {
            errors.push("recipients", Rule::Min(1));
        }
        for (idx, recipient) in self.recipients.iter().enumerate() {
            let email = &recipient.address.email;
            if email.is_empty() {
                errors.push(format!("recipients[{idx}].address.email"), Rule::Required);
            } else if email.parse::<Address>().is_err() {
                errors.push(format!("recipients[{idx}].address.email"), Rule::Email);
            }
        }
        if self.content.is_none() {
            errors.push("content", Rule::Required);
        }

        errors.into_result()
    }
}

/// `SparkPost` transmission wrapping an RFC 822 message.
///
/// Only the sender is read from the embedded message, recipients come from
/// the envelope.
pub struct SparkPost {
    rfc5322: std::sync::Arc<dyn Converter>,
}

impl std::fmt::Debug for SparkPost {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparkPost")
            .field("rfc5322", &self.rfc5322.id())
            .finish()
    }
}

impl Default for SparkPost {
    #[inline]
    fn default() -> Self {
        Self::new(std::sync::Arc::new(Rfc5322::new()))
    }
}

impl SparkPost {
    /// Create the converter, `rfc5322` parses the embedded message.
    #[inline]
    #[must_use]
    pub fn new(rfc5322: std::sync::Arc<dyn Converter>) -> Self {
        Self { rfc5322 }
    }
}

impl Converter for SparkPost {
    #[inline]
    fn id(&self) -> ConverterId {
        ConverterId::from(SPARKPOST_ID)
    }

    #[inline]
    #[tracing::instrument(name = "sparkpost", skip_all, err)]
    fn convert(&self, payload: Payload) -> ConvertResult<Message> {
        let raw = payload.into_body().read_all()?;
        let transmission = serde_json::from_slice::<Transmission>(&raw)?;
        transmission.validate()?;

        let email_rfc822 = transmission
            .content
            .map(|content| content.email_rfc822)
            .unwrap_or_default();
        if email_rfc822.is_empty() {
            return Err(crate::ConvertError::InlineContentNotImplemented);
        }

        let parsed = self.rfc5322.convert(Payload::from_bytes(email_rfc822))?;
        let from = parsed.from().to_owned();
        let mut body = parsed.into_raw();
        body.rewind()?;

        let recipients = transmission
            .recipients
            .into_iter()
            .map(|recipient| recipient.address.email)
            .collect::<Vec<_>>();
        tracing::debug!(%from, recipients = recipients.len(), "Transmission converted.");

        Ok(Message::new(from, recipients, vec![], vec![], body))
    }
}

#[cfg(test)]
mod tests {
    use super::{SparkPost, Transmission};
    use crate::{ConvertError, Converter, Payload, Rule, Stub};

    const EMAIL: &str = "From: Test <test@example.com>\nTo: Bob <bob@example.com>\nBcc: hidden@example.com\nSubject: Hello world!\n\nHello world!";

    fn transmission(recipients: &[&str], email_rfc822: Option<&str>) -> String {
        serde_json::json!({
            "recipients": recipients
                .iter()
                .map(|email| serde_json::json!({ "address": { "email": email } }))
                .collect::<Vec<_>>(),
            "content": email_rfc822.map(|email| serde_json::json!({ "email_rfc822": email })),
        })
        .to_string()
    }

    fn convert(input: impl Into<Vec<u8>>) -> Result<smtpgate_common::Message, ConvertError> {
        SparkPost::default().convert(Payload::from_bytes(input))
    }

    #[test_log::test]
    fn recipients_come_from_the_envelope() {
        let mut message =
            convert(transmission(&["r@x.com", "s@x.com"], Some(EMAIL))).unwrap();

        assert_eq!(message.from(), "Test <test@example.com>");
        pretty_assertions::assert_eq!(message.to(), &["r@x.com", "s@x.com"]);
        assert!(message.cc().is_empty());
        assert!(message.bcc().is_empty());
        assert_eq!(message.raw().unwrap(), EMAIL.as_bytes());
    }

    #[test]
    fn inline_content() {
        let error = convert(
            r#"{"recipients":[{"address":{"email":"r@x.com"}}],"content":{"email_rfc822":""}}"#,
        )
        .unwrap_err();
        assert!(matches!(error, ConvertError::InlineContentNotImplemented));
        assert_eq!(error.to_string(), "inline content transmission not implemented");
    }

    #[rstest::rstest]
    #[case(&[], Some(EMAIL), &[("recipients", Rule::Min(1))])]
    #[case(&["not an email"], Some(EMAIL), &[("recipients[0].address.email", Rule::Email)])]
    #[case(&["r@x.com", ""], Some(EMAIL), &[("recipients[1].address.email", Rule::Required)])]
    #[case(&["r@x.com"], None, &[("content", Rule::Required)])]
    #[case(&[], None, &[("recipients", Rule::Min(1)), ("content", Rule::Required)])]
    fn validation(
        #[case] recipients: &[&str],
        #[case] email_rfc822: Option<&str>,
        #[case] expected: &[(&str, Rule)],
    ) {
        let error = convert(transmission(recipients, email_rfc822)).unwrap_err();
        let ConvertError::Validation(errors) = &error else {
            panic!("expected a validation error, got {error:?}");
        };
        pretty_assertions::assert_eq!(
            errors
                .fields()
                .iter()
                .map(|field| (field.field.as_str(), field.rule))
                .collect::<Vec<_>>(),
            expected
        );
    }

    #[rstest::rstest]
    #[case("")]
    #[case("{")]
    #[case(r#"{"recipients":"r@x.com"}"#)]
    fn malformed_json(#[case] input: &str) {
        assert!(matches!(convert(input), Err(ConvertError::Json(_))));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let message = convert(
            r#"{"options":{"sandbox":true},"recipients":[{"address":{"email":"r@x.com","name":"R"}}],"content":{"email_rfc822":"From: a@x.com\n\nhi"}}"#,
        )
        .unwrap();
        assert_eq!(message.from(), "a@x.com");
    }

    #[test]
    fn nested_parse_error() {
        let converter = SparkPost::new(std::sync::Arc::new(Stub::new("rfc5322", |_| {
            Err(ConvertError::NonMimeNotImplemented)
        })));
        let result = converter.convert(Payload::from_bytes(transmission(&["r@x.com"], Some(EMAIL))));
        assert!(matches!(result, Err(ConvertError::NonMimeNotImplemented)));
    }

    #[test]
    fn schema() {
        let parsed = serde_json::from_str::<Transmission>(
            r#"{"recipients":[{"address":{"email":"r@x.com"}}],"content":{"email_rfc822":"x"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.recipients[0].address.email, "r@x.com");
        assert_eq!(parsed.content.unwrap().email_rfc822, "x");
    }
}
