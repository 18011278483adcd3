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

/// A byte source that can be read to the end and then rewound.
///
/// Converters parse the headers once, the dispatcher reads the whole content a
/// second time for the `DATA` command: both passes must see the same bytes.
pub trait SeekableBuffer: std::io::Read + std::io::Seek + Send {
    /// Read from the current position to the end of the buffer.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying reader
    #[inline]
    fn read_all(&mut self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl<T: std::io::Read + std::io::Seek + Send> SeekableBuffer for T {}

/// Normalized representation of an email, produced by a converter and
/// consumed once by the dispatcher.
pub struct Message {
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    raw: Box<dyn SeekableBuffer>,
}

impl std::fmt::Debug for Message {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .finish_non_exhaustive()
    }
}

impl Message {
    /// Create a new message.
    #[inline]
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: Vec<String>,
        cc: Vec<String>,
        bcc: Vec<String>,
        raw: Box<dyn SeekableBuffer>,
    ) -> Self {
        Self {
            from: from.into(),
            to,
            cc,
            bcc,
            raw,
        }
    }

    /// Sender of the message, may be empty.
    #[inline]
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    ///
    #[inline]
    #[must_use]
    pub fn to(&self) -> &[String] {
        &self.to
    }

    ///
    #[inline]
    #[must_use]
    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    ///
    #[inline]
    #[must_use]
    pub fn bcc(&self) -> &[String] {
        &self.bcc
    }

    /// Drain the content stream into a buffer.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying stream
    #[inline]
    pub fn raw(&mut self) -> std::io::Result<Vec<u8>> {
        self.raw.read_all()
    }

    /// Consume the message and return its content stream.
    #[inline]
    #[must_use]
    pub fn into_raw(self) -> Box<dyn SeekableBuffer> {
        self.raw
    }

    /// Is there at least one recipient in `to`, `cc` or `bcc`.
    #[inline]
    #[must_use]
    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}
