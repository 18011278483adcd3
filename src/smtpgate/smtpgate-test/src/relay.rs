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

//! A scripted SMTP relay listening on the loopback interface.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const EHLO_REPLY: &str = "250-fake.relay\r\n250-8BITMIME\r\n250 SMTPUTF8";

/// What the relay received.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Every command line, without its "\r\n".
    pub transcript: Vec<String>,
    /// Content of each `DATA`, transparency dots removed.
    pub payloads: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct Script {
    greeting: String,
    rejected_recipients: Vec<String>,
    cancel_after_data: Option<CancellationToken>,
    stall_first_data: Option<std::time::Duration>,
    stalled: std::sync::atomic::AtomicBool,
}

/// Builder of a [`FakeRelay`].
#[derive(Debug)]
pub struct Builder {
    script: Script,
}

impl Builder {
    /// Greet the clients with `code` instead of `220`, a negative code ends the session.
    #[must_use]
    pub fn greeting(mut self, code: u16, text: &str) -> Self {
        self.script.greeting = format!("{code} {text}");
        self
    }

    /// Answer `RCPT TO:<address>` with a `550`.
    #[must_use]
    pub fn reject_recipient(mut self, address: impl Into<String>) -> Self {
        self.script.rejected_recipients.push(address.into());
        self
    }

    /// Cancel `token` when a message content has been received, before replying.
    #[must_use]
    pub fn cancel_after_data(mut self, token: CancellationToken) -> Self {
        self.script.cancel_after_data = Some(token);
        self
    }

    /// Wait `delay` before acknowledging the first message content received.
    #[must_use]
    pub fn stall_first_data(mut self, delay: std::time::Duration) -> Self {
        self.script.stall_first_data = Some(delay);
        self
    }

    /// Bind `127.0.0.1:0` and serve in the background.
    ///
    /// # Errors
    ///
    /// * the socket cannot be bound
    pub async fn spawn(self) -> std::io::Result<FakeRelay> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let recording = std::sync::Arc::new(std::sync::Mutex::new(Recording::default()));
        let script = std::sync::Arc::new(self.script);

        let handle = tokio::spawn({
            let recording = recording.clone();
            async move {
                loop {
                    let (stream, peer) = match listener.accept().await {
                        Ok(client) => client,
                        Err(error) => {
                            tracing::error!(%error, "fake relay failed to accept");
                            return;
                        }
                    };
                    tracing::debug!(%peer, "fake relay accepted a connection");

                    let (script, recording) = (script.clone(), recording.clone());
                    tokio::spawn(async move {
                        if let Err(error) = serve(stream, &script, &recording).await {
                            tracing::warn!(%error, "fake relay session ended with an error");
                        }
                    });
                }
            }
        });

        Ok(FakeRelay {
            addr,
            recording,
            handle,
        })
    }
}

/// A relay accepting everything unless scripted otherwise.
#[derive(Debug)]
pub struct FakeRelay {
    addr: std::net::SocketAddr,
    recording: std::sync::Arc<std::sync::Mutex<Recording>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for FakeRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl FakeRelay {
    /// Start scripting a relay.
    #[must_use]
    pub fn builder() -> Builder {
        Builder {
            script: Script {
                greeting: "220 fake.relay ESMTP".to_owned(),
                rejected_recipients: vec![],
                cancel_after_data: None,
                stall_first_data: None,
                stalled: std::sync::atomic::AtomicBool::new(false),
            },
        }
    }

    /// `host:port` to dial.
    #[must_use]
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Relay section of a configuration pointing to this relay.
    #[must_use]
    pub fn config(&self) -> smtpgate_config::FieldRelay {
        smtpgate_config::FieldRelay {
            addr: Some(self.addr()),
            hello_name: "gateway.test".to_owned(),
            connect_timeout: std::time::Duration::from_secs(1),
            io_timeout: std::time::Duration::from_secs(2),
        }
    }

    /// Snapshot of what was received so far.
    #[must_use]
    pub fn recording(&self) -> Recording {
        self.recording
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

fn record(recording: &std::sync::Mutex<Recording>, update: impl FnOnce(&mut Recording)) {
    update(&mut recording.lock().unwrap_or_else(std::sync::PoisonError::into_inner));
}

/// Split a command line into its verb, normalized, and its argument.
fn verb(line: &str) -> Option<(&'static str, &str)> {
    ["EHLO ", "HELO ", "MAIL FROM:", "RCPT TO:", "DATA", "RSET", "NOOP", "QUIT"]
        .into_iter()
        .find(|verb| {
            line.get(..verb.len())
                .map_or(false, |prefix| prefix.eq_ignore_ascii_case(verb))
        })
        .map(|verb| (verb, &line[verb.len()..]))
}

/// Path of a `MAIL FROM` / `RCPT TO` argument, without its parameters.
fn path(argument: &str) -> &str {
    let argument = argument.trim_start();
    let end = argument.find('>').map_or(argument.len(), |end| end + 1);
    argument[..end].trim_start_matches('<').trim_end_matches('>')
}

async fn serve(
    stream: tokio::net::TcpStream,
    script: &Script,
    recording: &std::sync::Mutex<Recording>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = tokio::io::BufReader::new(read).lines();

    write
        .write_all(format!("{}\r\n", script.greeting).as_bytes())
        .await?;
    if !script.greeting.starts_with('2') {
        return write.shutdown().await;
    }

    while let Some(line) = lines.next_line().await? {
        record(recording, |r| r.transcript.push(line.clone()));

        let reply = match verb(&line) {
            None => "500 5.5.2 syntax error",
            Some(("EHLO ", _)) => EHLO_REPLY,
            Some(("HELO ", _)) => "250 fake.relay",
            Some(("MAIL FROM:", _)) => "250 2.1.0 sender ok",
            Some(("RCPT TO:", argument)) => {
                if script.rejected_recipients.iter().any(|i| i == path(argument)) {
                    "550 5.1.1 unknown user"
                } else {
                    "250 2.1.5 recipient ok"
                }
            }
            Some(("DATA", _)) => {
                write
                    .write_all(b"354 end data with <CR><LF>.<CR><LF>\r\n")
                    .await?;

                let mut content = vec![];
                loop {
                    let Some(line) = lines.next_line().await? else {
                        return Ok(());
                    };
                    if line == "." {
                        break;
                    }
                    content.extend_from_slice(line.strip_prefix('.').unwrap_or(&line).as_bytes());
                    content.extend_from_slice(b"\r\n");
                }
                record(recording, |r| r.payloads.push(content));

                if let Some(delay) = script.stall_first_data {
                    if !script.stalled.swap(true, std::sync::atomic::Ordering::SeqCst) {
                        tokio::time::sleep(delay).await;
                    }
                }
                if let Some(token) = &script.cancel_after_data {
                    token.cancel();
                }
                "250 2.0.0 queued"
            }
            Some(("QUIT", _)) => {
                write.write_all(b"221 2.0.0 bye\r\n").await?;
                return write.shutdown().await;
            }
            Some(_) => "250 2.0.0 ok",
        };
        write.write_all(format!("{reply}\r\n").as_bytes()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{path, verb};

    #[rstest::rstest]
    #[case("EHLO gateway.test", Some(("EHLO ", "gateway.test")))]
    #[case("mail from:<a@x.com> BODY=8BITMIME", Some(("MAIL FROM:", "<a@x.com> BODY=8BITMIME")))]
    #[case("DATA", Some(("DATA", "")))]
    #[case("VRFY a", None)]
    fn split(#[case] line: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(verb(line), expected);
    }

    #[rstest::rstest]
    #[case("<a@x.com>", "a@x.com")]
    #[case(" <a@x.com> BODY=8BITMIME", "a@x.com")]
    #[case("<>", "")]
    fn envelope_path(#[case] argument: &str, #[case] expected: &str) {
        assert_eq!(path(argument), expected);
    }
}
