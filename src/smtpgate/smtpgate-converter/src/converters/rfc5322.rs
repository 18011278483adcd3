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

use crate::{parser::headers::Headers, ConvertResult, Converter, ConverterId, Payload};
use smtpgate_common::{Message, SeekableBuffer};

/// Identifier of the [`Rfc5322`] converter.
pub const RFC5322_ID: &str = "rfc5322";

/// Raw RFC 5322 message: recipients are read from the `To`, `Cc` and `Bcc` headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rfc5322;

impl Rfc5322 {
    ///
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Read the header section of `body`, then rewind it to the start.
    ///
    /// # Errors
    ///
    /// * the body could not be read or rewound
    /// * the header section is malformed
    #[inline]
    pub fn read_headers(&self, body: &mut dyn SeekableBuffer) -> ConvertResult<Headers> {
        let raw = body.read_all()?;
        let headers = Headers::parse(&raw)?;
        body.rewind()?;
        Ok(headers)
    }
}

impl Converter for Rfc5322 {
    #[inline]
    fn id(&self) -> ConverterId {
        ConverterId::from(RFC5322_ID)
    }

    #[inline]
    #[tracing::instrument(name = "rfc5322", skip_all, err)]
    fn convert(&self, payload: Payload) -> ConvertResult<Message> {
        let mut body = payload.into_body();
        let headers = self.read_headers(body.as_mut())?;

        Ok(Message::new(
            headers.get("From").unwrap_or_default(),
            headers.addresses("To"),
            headers.addresses("Cc"),
            headers.addresses("Bcc"),
            body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::Rfc5322;
    use crate::{parser::headers::HeaderError, ConvertError, Converter, Payload};
    use smtpgate_common::SeekableBuffer;

    const SIMPLE: &str = "From: Test <test@example.com>\nTo: Bob <bob@example.com>\nSubject: Hello world!\n\nHello world!";

    fn convert(input: &str) -> Result<smtpgate_common::Message, ConvertError> {
        Rfc5322::new().convert(Payload::from_bytes(input))
    }

    #[rstest::rstest]
    #[case(SIMPLE, "Test <test@example.com>", &["Bob <bob@example.com>"], &[], &[])]
    #[case(
        "From: Test <test@example.com>\nTo: Bob <bob@example.com>\nCc: Alice <alice@example.com>, bob@example.com\nSubject: Hello world!\n\nHello world!",
        "Test <test@example.com>",
        &["Bob <bob@example.com>"],
        &["Alice <alice@example.com>", "bob@example.com"],
        &[]
    )]
    #[case(
        "From: Test <test@example.com>\nBcc: Bob <bob@example.com>,Alice <alice@example.com>\nSubject: Hello world!\n\nHello world!",
        "Test <test@example.com>",
        &[],
        &[],
        &["Bob <bob@example.com>", "Alice <alice@example.com>"]
    )]
    #[case("Subject: no sender\r\n\r\nbody", "", &[], &[], &[])]
    #[case(
        "From: a@x.com\nTo: b@x.com,\nBcc: d@x.com, ,\n\nbody",
        "a@x.com",
        &["b@x.com"],
        &[],
        &["d@x.com"]
    )]
    fn headers(
        #[case] input: &str,
        #[case] from: &str,
        #[case] to: &[&str],
        #[case] cc: &[&str],
        #[case] bcc: &[&str],
    ) {
        let message = convert(input).unwrap();
        assert_eq!(message.from(), from);
        pretty_assertions::assert_eq!(message.to(), to);
        pretty_assertions::assert_eq!(message.cc(), cc);
        pretty_assertions::assert_eq!(message.bcc(), bcc);
    }

    #[test]
    fn raw_is_the_original_input() {
        let mut message = convert(SIMPLE).unwrap();
        assert_eq!(message.raw().unwrap(), SIMPLE.as_bytes());
    }

    #[test]
    fn parse_twice_on_rewound_stream() {
        let mut body = std::io::Cursor::new(SIMPLE.as_bytes().to_vec());
        let first = Rfc5322::new().read_headers(&mut body).unwrap();
        let second = Rfc5322::new().read_headers(&mut body).unwrap();
        assert_eq!(first, second);
        assert_eq!(body.read_all().unwrap(), SIMPLE.as_bytes());
    }

    #[rstest::rstest]
    #[case("", HeaderError::EmptyInput)]
    #[case(
        " From: Test <test@example.com>\nTo: Bob <bob@example.com>\n\nHello world!",
        HeaderError::InitialLine(" From: Test <test@example.com>".to_owned())
    )]
    fn malformed(#[case] input: &str, #[case] expected: HeaderError) {
        let error = convert(input).unwrap_err();
        assert!(error.to_string().starts_with("failed to parse input: "));
        assert!(matches!(error, ConvertError::Parse(parse) if parse == expected));
    }
}
