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

use smtpgate_common::ErrorClass;

/// Failure of a [`crate::Dispatcher`] operation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No message was handed to the dispatcher.
    #[error("failed to process nil message")]
    NilMessage,
    /// The message has neither `to`, `cc` nor `bcc`.
    #[error("message has no recipient")]
    NoRecipient,
    /// The content of the message could not be read.
    #[error("failed to read the message content: {0}")]
    Read(#[source] std::io::Error),
    /// The sender or a recipient cannot be used as an envelope path.
    #[error("invalid envelope address {address:?}: {source}")]
    InvalidAddress {
        /// Value as found in the message.
        address: String,
        ///
        #[source]
        source: lettre::address::AddressError,
    },
    /// The envelope of a recipient group was refused.
    #[error("invalid envelope: {0}")]
    Envelope(#[source] lettre::error::Error),
    /// No relay address is configured.
    #[error("no smtp server address configured")]
    NoAddress,
    /// The relay address does not resolve to a socket address.
    #[error("failed to resolve smtp server address '{addr}': {source}")]
    Resolve {
        ///
        addr: String,
        ///
        #[source]
        source: std::io::Error,
    },
    /// The relay could not be reached or refused the session.
    #[error("failed to dial smtp server at '{addr}': {source}")]
    Connect {
        ///
        addr: String,
        ///
        #[source]
        source: lettre::transport::smtp::Error,
    },
    /// [`crate::Dispatcher::close`] has already been called.
    #[error("connection already closed")]
    Closed,
    /// A command failed in the middle of a send.
    #[error("an error occurred while sending emails: {source}")]
    Transport {
        /// Recipients accepted by the groups completed before the failure.
        accepted: usize,
        ///
        #[source]
        source: lettre::transport::smtp::Error,
    },
    /// The relay did not answer in time, the session is dropped.
    #[error("smtp server did not answer within {timeout:?}")]
    Timeout {
        /// Recipients accepted by the groups completed before the failure.
        accepted: usize,
        ///
        timeout: std::time::Duration,
    },
    /// The relay did not acknowledge `QUIT`.
    #[error("failed to close smtp server connection: {0}")]
    Quit(#[source] lettre::transport::smtp::Error),
}

impl DispatchError {
    /// Number of recipients accepted before the failure.
    #[inline]
    #[must_use]
    pub const fn accepted(&self) -> usize {
        match self {
            Self::Transport { accepted, .. } | Self::Timeout { accepted, .. } => *accepted,
            _ => 0,
        }
    }

    /// Category of the error.
    #[inline]
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NilMessage | Self::NoRecipient | Self::Read(_) => ErrorClass::Invariant,
            Self::InvalidAddress { .. } | Self::Envelope(_) => ErrorClass::Validation,
            Self::NoAddress
            | Self::Resolve { .. }
            | Self::Connect { .. }
            | Self::Closed
            | Self::Transport { .. }
            | Self::Timeout { .. }
            | Self::Quit(_) => ErrorClass::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchError;
    use smtpgate_common::ErrorClass;

    #[test]
    fn timeout() {
        let error = DispatchError::Timeout {
            accepted: 2,
            timeout: std::time::Duration::from_millis(100),
        };
        assert_eq!(error.accepted(), 2);
        assert_eq!(error.class(), ErrorClass::Transport);
        assert_eq!(error.to_string(), "smtp server did not answer within 100ms");
    }

    #[test]
    fn invalid_address() {
        let address = "b@x.com\r\nc@x.com";
        let error = DispatchError::InvalidAddress {
            address: address.to_owned(),
            source: address.parse::<lettre::Address>().unwrap_err(),
        };
        assert_eq!(error.accepted(), 0);
        assert_eq!(error.class(), ErrorClass::Validation);
        assert!(error
            .to_string()
            .starts_with(r#"invalid envelope address "b@x.com\r\nc@x.com": "#));
    }

    #[rstest::rstest]
    #[case(DispatchError::NilMessage, "failed to process nil message")]
    #[case(DispatchError::NoRecipient, "message has no recipient")]
    fn invariant(#[case] error: DispatchError, #[case] expected: &str) {
        assert_eq!(error.accepted(), 0);
        assert_eq!(error.class(), ErrorClass::Invariant);
        assert_eq!(error.to_string(), expected);
    }
}
