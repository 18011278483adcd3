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

use crate::{build_recipient_groups, DispatchError};
use lettre::address::Envelope;
use lettre::transport::smtp::{client::AsyncSmtpConnection, extension::ClientId};
use smtpgate_common::{envelope_path, Message};
use smtpgate_config::FieldRelay;
use tokio_util::sync::CancellationToken;

/// Where and how to open a session with the relay.
struct Upstream {
    addr: String,
    target: std::net::SocketAddr,
    hello_name: ClientId,
    connect_timeout: std::time::Duration,
    io_timeout: std::time::Duration,
}

impl Upstream {
    async fn dial(&self) -> Result<AsyncSmtpConnection, DispatchError> {
        let dial = AsyncSmtpConnection::connect_tokio1(
            self.target,
            Some(self.connect_timeout),
            &self.hello_name,
            None,
            None,
        );

        match tokio::time::timeout(self.io_timeout, dial).await {
            Ok(Ok(connection)) => {
                tracing::debug!(server = ?connection.server_info(), "session opened");
                Ok(connection)
            }
            Ok(Err(source)) => Err(DispatchError::Connect {
                addr: self.addr.clone(),
                source,
            }),
            Err(_) => Err(DispatchError::Timeout {
                accepted: 0,
                timeout: self.io_timeout,
            }),
        }
    }
}

enum Session {
    Ready(AsyncSmtpConnection),
    /// The last transaction failed, the state of the session is unknown.
    Broken,
    Closed,
}

impl Session {
    /// The open connection, dialing again if the previous one broke.
    async fn ready(
        &mut self,
        upstream: &Upstream,
    ) -> Result<&mut AsyncSmtpConnection, DispatchError> {
        if matches!(self, Self::Broken) {
            tracing::info!("dialing again after a failed transaction");
            *self = Self::Ready(upstream.dial().await?);
        }
        match self {
            Self::Ready(connection) => Ok(connection),
            Self::Broken | Self::Closed => Err(DispatchError::Closed),
        }
    }
}

/// Owner of the connection to the upstream relay.
///
/// Shared by every caller: a send holds the connection for its whole
/// duration, so transactions of concurrent sends never interleave.
///
/// A failed transaction leaves the connection in an unknown state, it is
/// dropped and the next send dials the same socket address again.
pub struct Dispatcher {
    upstream: Upstream,
    session: tokio::sync::Mutex<Session>,
}

impl std::fmt::Debug for Dispatcher {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("addr", &self.upstream.addr)
            .field("target", &self.upstream.target)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Resolve the relay described by `config`, dial it and introduce ourselves.
    ///
    /// # Errors
    ///
    /// * no address is configured, or it does not resolve
    /// * the relay is unreachable or refuses the session
    #[inline]
    #[tracing::instrument(name = "dispatcher", skip_all, err)]
    pub async fn connect(config: &FieldRelay) -> Result<Self, DispatchError> {
        let addr = config.addr().map_err(|_| DispatchError::NoAddress)?;
        tracing::info!(addr, "dialing to smtp server");

        let target = tokio::net::lookup_host(addr)
            .await
            .and_then(|mut resolved| {
                resolved.next().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no socket address found")
                })
            })
            .map_err(|source| DispatchError::Resolve {
                addr: addr.to_owned(),
                source,
            })?;

        let upstream = Upstream {
            addr: addr.to_owned(),
            target,
            hello_name: ClientId::Domain(config.hello_name.clone()),
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
        };
        let connection = upstream.dial().await?;

        Ok(Self {
            upstream,
            session: tokio::sync::Mutex::new(Session::Ready(connection)),
        })
    }

    /// Address of the relay, as configured.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.upstream.addr
    }

    /// Deliver `message` and return the number of accepted recipients.
    ///
    /// The envelopes of every recipient group are built before the first
    /// command is issued. The token is checked before each group: once
    /// cancelled, the remaining groups are skipped and the count so far is
    /// returned.
    ///
    /// # Errors
    ///
    /// * `message` is `None` or has no recipient
    /// * its content cannot be read
    /// * the sender or a recipient is not a valid envelope address
    /// * the connection is closed, or cannot be dialed again
    /// * a transaction failed or timed out, see [`DispatchError::accepted`]
    #[inline]
    #[tracing::instrument(name = "send", skip_all, fields(addr = %self.upstream.addr))]
    pub async fn send(
        &self,
        token: &CancellationToken,
        message: Option<Message>,
    ) -> Result<usize, DispatchError> {
        let Some(mut message) = message else {
            return Err(DispatchError::NilMessage);
        };
        if !message.has_recipients() {
            return Err(DispatchError::NoRecipient);
        }

        let envelopes = build_recipient_groups(Some(&message))
            .iter()
            .map(|group| envelope(message.from(), group))
            .collect::<Result<Vec<_>, _>>()?;
        let payload = with_crlf(&message.raw().map_err(DispatchError::Read)?);

        let mut session = self.session.lock().await;
        let connection = session.ready(&self.upstream).await?;

        let outcome = self
            .transactions(connection, token, &envelopes, &payload)
            .await;
        match &outcome {
            Ok(accepted) => tracing::info!(accepted, "message sent"),
            Err(error) => {
                tracing::warn!(%error, "transaction failed, dropping the session");
                *session = Session::Broken;
            }
        }
        outcome
    }

    async fn transactions(
        &self,
        connection: &mut AsyncSmtpConnection,
        token: &CancellationToken,
        envelopes: &[Envelope],
        payload: &[u8],
    ) -> Result<usize, DispatchError> {
        let mut accepted = 0;
        for (index, envelope) in envelopes.iter().enumerate() {
            if token.is_cancelled() {
                tracing::warn!(
                    accepted,
                    skipped = envelopes.len() - index,
                    "process aborted"
                );
                return Ok(accepted);
            }

            let timeout = self.upstream.io_timeout;
            match tokio::time::timeout(timeout, connection.send(envelope, payload)).await {
                Ok(Ok(_)) => {}
                Ok(Err(source)) => return Err(DispatchError::Transport { accepted, source }),
                Err(_) => return Err(DispatchError::Timeout { accepted, timeout }),
            }

            accepted += envelope.to().len();
            tracing::debug!(recipients = envelope.to().len(), "transaction completed");
        }
        Ok(accepted)
    }

    /// Say `QUIT` to the relay and drop the connection.
    ///
    /// # Errors
    ///
    /// * the connection is already closed
    /// * the relay did not acknowledge `QUIT` in time
    #[inline]
    #[tracing::instrument(name = "close", skip_all, fields(addr = %self.upstream.addr))]
    pub async fn close(&self) -> Result<(), DispatchError> {
        tracing::info!("closing smtp server connection");

        let session = std::mem::replace(&mut *self.session.lock().await, Session::Closed);
        let mut connection = match session {
            Session::Ready(connection) => connection,
            Session::Broken => return Ok(()),
            Session::Closed => return Err(DispatchError::Closed),
        };

        let timeout = self.upstream.io_timeout;
        match tokio::time::timeout(timeout, connection.quit()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(source)) => Err(DispatchError::Quit(source)),
            Err(_) => Err(DispatchError::Timeout {
                accepted: 0,
                timeout,
            }),
        }
    }
}

/// Envelope of one transaction, from header-style values.
fn envelope(sender: &str, recipients: &[String]) -> Result<Envelope, DispatchError> {
    let parse = |value: &str| {
        envelope_path(value)
            .parse::<lettre::Address>()
            .map_err(|source| DispatchError::InvalidAddress {
                address: value.to_owned(),
                source,
            })
    };

    let reverse_path = if envelope_path(sender).is_empty() {
        None
    } else {
        Some(parse(sender)?)
    };
    let forward_paths = recipients
        .iter()
        .map(|recipient| parse(recipient))
        .collect::<Result<Vec<_>, _>>()?;

    Envelope::new(reverse_path, forward_paths).map_err(DispatchError::Envelope)
}

/// Terminate every line with CRLF, bare LF are not allowed on the wire.
fn with_crlf(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + content.len() / 32);
    let mut previous = None;
    for &byte in content {
        if byte == b'\n' && previous != Some(b'\r') {
            out.push(b'\r');
        }
        out.push(byte);
        previous = Some(byte);
    }
    out
}
