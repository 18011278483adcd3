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

//! Reader for the header section of an RFC 5322 message.

/// The header section is not well formed.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// Nothing to read.
    #[error("unexpected end of input")]
    EmptyInput,
    /// The first line is blank or a continuation line.
    #[error("malformed header initial line: {0:?}")]
    InitialLine(String),
    /// A line that is neither a field nor a continuation.
    #[error("malformed header line: {0:?}")]
    MalformedLine(String),
}

/// does the line start with a whitespace (folded header).
fn has_wsc(line: &str) -> bool {
    line.starts_with([' ', '\t'])
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

/// Header fields of a message, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Read the header section at the start of `input`.
    ///
    /// The section ends at the first empty line or at the end of the input.
    /// Folded lines are unfolded, values are trimmed.
    ///
    /// # Errors
    ///
    /// * see [`HeaderError`]
    #[inline]
    pub fn parse(input: &[u8]) -> Result<Self, HeaderError> {
        if input.is_empty() {
            return Err(HeaderError::EmptyInput);
        }

        let text = String::from_utf8_lossy(input);
        let mut fields: Vec<(String, String)> = vec![];

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if fields.is_empty() && (line.is_empty() || has_wsc(line)) {
                return Err(HeaderError::InitialLine(line.to_owned()));
            }
            if line.is_empty() {
                break;
            }

            if has_wsc(line) {
                if let Some((_, value)) = fields.last_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if is_field_name(name) => {
                    fields.push((name.to_owned(), value.trim().to_owned()));
                }
                _ => return Err(HeaderError::MalformedLine(line.to_owned())),
            }
        }

        Ok(Self(fields))
    }

    /// Value of the first field named `name`, case insensitive.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Comma separated list of the first field named `name`.
    ///
    /// An absent or empty field gives an empty list, empty entries such as
    /// the one left by a trailing comma are skipped.
    #[inline]
    #[must_use]
    pub fn addresses(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{HeaderError, Headers};

    #[test]
    fn unfold_and_lookup() {
        let headers = Headers::parse(
            b"From: Test <test@example.com>\r\n\
              To: Bob <bob@example.com>,\r\n\
              \tAlice <alice@example.com>\r\n\
              subject:   Hello  \r\n\
              SUBJECT: second\r\n\
              \r\n\
              Not: a header\r\n",
        )
        .unwrap();

        assert_eq!(headers.get("from"), Some("Test <test@example.com>"));
        assert_eq!(
            headers.get("To"),
            Some("Bob <bob@example.com>, Alice <alice@example.com>")
        );
        assert_eq!(headers.get("Subject"), Some("Hello"));
        assert_eq!(headers.get("Not"), None);
    }

    #[test]
    fn end_of_input_ends_headers() {
        let headers = Headers::parse(b"From: a@x.com\nTo: b@x.com").unwrap();
        assert_eq!(headers.get("To"), Some("b@x.com"));
    }

    #[rstest::rstest]
    #[case("To", &["Bob <bob@example.com>", "Alice <alice@example.com>"])]
    #[case("Cc", &["c@x.com", "d@x.com"])]
    #[case("Bcc", &[])]
    #[case("Resent-Bcc", &["e@x.com"])]
    #[case("Reply-To", &[])]
    fn addresses(#[case] name: &str, #[case] expected: &[&str]) {
        let headers = Headers::parse(
            b"To:  Bob <bob@example.com> ,Alice <alice@example.com>\n\
              Cc: c@x.com,,d@x.com\n\
              Bcc:   \n\
              Resent-Bcc: e@x.com, \n",
        )
        .unwrap();
        pretty_assertions::assert_eq!(headers.addresses(name), expected);
    }

    #[rstest::rstest]
    #[case(b"", HeaderError::EmptyInput)]
    #[case(b" From: Test <test@example.com>\n", HeaderError::InitialLine(" From: Test <test@example.com>".to_owned()))]
    #[case(b"\r\nFrom: a@x.com\r\n", HeaderError::InitialLine(String::new()))]
    #[case(b"From: a@x.com\nHello world!\n", HeaderError::MalformedLine("Hello world!".to_owned()))]
    #[case(b"From a@x.com: b\n", HeaderError::MalformedLine("From a@x.com: b".to_owned()))]
    #[case(b": empty name\n", HeaderError::MalformedLine(": empty name".to_owned()))]
    fn malformed(#[case] input: &[u8], #[case] expected: HeaderError) {
        assert_eq!(Headers::parse(input).unwrap_err(), expected);
    }
}
