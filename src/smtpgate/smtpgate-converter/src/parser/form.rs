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

//! Reader for `multipart/form-data` bodies.

use super::headers::{HeaderError, Headers};

/// The form could not be read.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// No content type declared for the submission.
    #[error("missing content type")]
    MissingContentType,
    /// The content type is not a multipart form.
    #[error("content type {0:?} is not multipart/form-data")]
    NotMultipart(String),
    /// No `boundary` parameter in the content type.
    #[error("missing boundary in content type")]
    MissingBoundary,
    /// The body does not start with the boundary delimiter.
    #[error("no boundary delimiter found in the body")]
    MissingDelimiter,
    /// The body ends before the closing delimiter.
    #[error("unexpected end of body, closing delimiter not found")]
    UnexpectedEnd,
    /// A part without a `Content-Disposition: form-data; name=...` header.
    #[error("part {0} has no form-data name")]
    MissingName(usize),
    /// A part header section is malformed.
    #[error("part {index}: {error}")]
    Header {
        /// position of the part in the body
        index: usize,
        ///
        error: HeaderError,
    },
}

/// Read the `boundary` parameter of a `multipart/form-data` content type.
///
/// # Errors
///
/// * the content type is absent, of another type, or has no boundary
#[inline]
pub fn boundary(content_type: Option<&str>) -> Result<String, FormError> {
    let content_type = content_type.ok_or(FormError::MissingContentType)?;
    let mut params = content_type.split(';');

    let mime = params.next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(FormError::NotMultipart(content_type.to_owned()));
    }

    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_owned())
        .filter(|value| !value.is_empty())
        .ok_or(FormError::MissingBoundary)
}

/// Value of the `key` parameter of a header like `form-data; name="to"`.
fn parameter<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    header
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(key))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

fn find(bytes: &[u8], search: &[u8]) -> Option<usize> {
    bytes
        .windows(search.len())
        .position(|window| window == search)
}

/// Split a part into its header section and its content.
fn split_part(part: &[u8]) -> (&[u8], &[u8]) {
    if let Some(content) = part.strip_prefix(b"\r\n").or_else(|| part.strip_prefix(b"\n")) {
        return (&[], content);
    }
    let crlf = find(part, b"\r\n\r\n").map(|pos| (pos, 4));
    let lf = find(part, b"\n\n").map(|pos| (pos, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => {
            let (pos, len) = if a.0 <= b.0 { a } else { b };
            (&part[..pos], &part[pos + len..])
        }
        (Some((pos, len)), None) | (None, Some((pos, len))) => (&part[..pos], &part[pos + len..]),
        (None, None) => (part, &[]),
    }
}

/// Fields and files of a `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    values: std::collections::BTreeMap<String, Vec<String>>,
    files: std::collections::BTreeMap<String, Vec<Vec<u8>>>,
}

impl MultipartForm {
    /// Read a body delimited by `boundary`.
    ///
    /// Parts with a `filename` are stored as files, the others as text values.
    ///
    /// # Errors
    ///
    /// * see [`FormError`]
    #[inline]
    pub fn parse(body: &[u8], boundary: &str) -> Result<Self, FormError> {
        let delimiter = format!("--{boundary}");
        let delimiter = delimiter.as_bytes();

        let mut positions = vec![];
        let mut start = 0;
        while let Some(pos) = find(&body[start..], delimiter) {
            let at = start + pos;
            if at == 0 || body[at - 1] == b'\n' {
                positions.push(at);
            }
            start = at + delimiter.len();
        }
        if positions.is_empty() {
            return Err(FormError::MissingDelimiter);
        }

        let mut form = Self::default();
        for (index, window) in positions.windows(2).enumerate() {
            let (current, next) = (window[0], window[1]);
            let after = &body[current + delimiter.len()..next];
            if after.starts_with(b"--") {
                return Ok(form);
            }

            // the rest of the delimiter line is transport padding
            let Some(eol) = find(after, b"\n") else {
                return Err(FormError::UnexpectedEnd);
            };
            let mut part = &after[eol + 1..];
            part = part.strip_suffix(b"\n").unwrap_or(part);
            part = part.strip_suffix(b"\r").unwrap_or(part);

            form.insert_part(index, part)?;
        }

        let last = positions[positions.len() - 1];
        if body[last + delimiter.len()..].starts_with(b"--") {
            Ok(form)
        } else {
            Err(FormError::UnexpectedEnd)
        }
    }

    fn insert_part(&mut self, index: usize, part: &[u8]) -> Result<(), FormError> {
        let (head, content) = split_part(part);
        if head.is_empty() {
            return Err(FormError::MissingName(index));
        }
        let headers =
            Headers::parse(head).map_err(|error| FormError::Header { index, error })?;

        let disposition = headers
            .get("Content-Disposition")
            .filter(|value| {
                value
                    .split(';')
                    .next()
                    .map_or(false, |kind| kind.trim().eq_ignore_ascii_case("form-data"))
            })
            .ok_or(FormError::MissingName(index))?;
        let name = parameter(disposition, "name")
            .filter(|name| !name.is_empty())
            .ok_or(FormError::MissingName(index))?
            .to_owned();

        match parameter(disposition, "filename") {
            Some(_) => self.files.entry(name).or_default().push(content.to_vec()),
            None => self
                .values
                .entry(name)
                .or_default()
                .push(String::from_utf8_lossy(content).into_owned()),
        }
        Ok(())
    }

    /// Text values submitted under `name`, in order.
    #[inline]
    #[must_use]
    pub fn values(&self, name: &str) -> &[String] {
        self.values.get(name).map_or(&[], Vec::as_slice)
    }

    /// Remove and return the content of the first file submitted under `name`.
    #[inline]
    pub fn take_file(&mut self, name: &str) -> Option<Vec<u8>> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{boundary, FormError, MultipartForm};

    const BODY: &str = concat!(
        "--xYzZY\r\n",
        "Content-Disposition: form-data; name=\"to\"\r\n",
        "\r\n",
        "bob@example.com, alice@example.com\r\n",
        "--xYzZY\r\n",
        "Content-Disposition: form-data; name=\"to\"\r\n",
        "\r\n",
        "carol@example.com\r\n",
        "--xYzZY\r\n",
        "Content-Disposition: form-data; name=\"message\"; filename=\"message.mime\"\r\n",
        "Content-Type: message/rfc822\r\n",
        "\r\n",
        "From: a@x.com\r\n",
        "\r\n",
        "--not a delimiter\r\n",
        "--xYzZY--\r\n",
    );

    #[rstest::rstest]
    #[case(Some("multipart/form-data; boundary=xYzZY"), Ok("xYzZY".to_owned()))]
    #[case(Some("Multipart/Form-Data; charset=utf-8; boundary=\"a b\""), Ok("a b".to_owned()))]
    #[case(None, Err(FormError::MissingContentType))]
    #[case(Some("application/json"), Err(FormError::NotMultipart("application/json".to_owned())))]
    #[case(Some("multipart/form-data"), Err(FormError::MissingBoundary))]
    #[case(Some("multipart/form-data; boundary="), Err(FormError::MissingBoundary))]
    fn content_type(#[case] input: Option<&str>, #[case] expected: Result<String, FormError>) {
        assert_eq!(boundary(input), expected);
    }

    #[test]
    fn values_and_files() {
        let mut form = MultipartForm::parse(BODY.as_bytes(), "xYzZY").unwrap();

        pretty_assertions::assert_eq!(
            form.values("to"),
            &["bob@example.com, alice@example.com", "carol@example.com"]
        );
        assert!(form.values("cc").is_empty());
        pretty_assertions::assert_eq!(
            form.take_file("message"),
            Some(b"From: a@x.com\r\n\r\n--not a delimiter".to_vec())
        );
        assert_eq!(form.take_file("message"), None);
        assert_eq!(form.take_file("to"), None);
    }

    #[test]
    fn lf_line_endings() {
        let body = BODY.replace("\r\n", "\n");
        let mut form = MultipartForm::parse(body.as_bytes(), "xYzZY").unwrap();
        assert_eq!(form.values("to").len(), 2);
        assert!(form.take_file("message").is_some());
    }

    #[rstest::rstest]
    #[case("no delimiter at all", FormError::MissingDelimiter)]
    #[case("--xYzZY\r\nContent-Disposition: form-data; name=\"to\"\r\n\r\nbob", FormError::UnexpectedEnd)]
    #[case("--xYzZY\r\nContent-Type: text/plain\r\n\r\nbob\r\n--xYzZY--", FormError::MissingName(0))]
    #[case("--xYzZY\r\n\r\nbob\r\n--xYzZY--", FormError::MissingName(0))]
    fn malformed(#[case] body: &str, #[case] expected: FormError) {
        assert_eq!(
            MultipartForm::parse(body.as_bytes(), "xYzZY").unwrap_err(),
            expected
        );
    }
}
