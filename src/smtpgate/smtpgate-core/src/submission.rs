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

//! Conversion and delivery of the inputs given on the command line.

use smtpgate_common::ErrorClass;
use smtpgate_converter::{ConvertError, Converter, Payload};
use smtpgate_delivery::{CancellationToken, DispatchError, Dispatcher};
use tokio::io::AsyncReadExt;

/// Failure of one submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The input could not be read.
    #[error("failed to read '{input}': {source}")]
    Read {
        ///
        input: String,
        ///
        #[source]
        source: std::io::Error,
    },
    ///
    #[error(transparent)]
    Convert(#[from] ConvertError),
    ///
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl SubmissionError {
    /// Category of the error.
    #[must_use]
    #[inline]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Read { .. } => ErrorClass::Invariant,
            Self::Convert(error) => error.class(),
            Self::Dispatch(error) => error.class(),
        }
    }

    /// Recipients accepted before the failure.
    #[must_use]
    #[inline]
    pub const fn accepted(&self) -> usize {
        match self {
            Self::Dispatch(error) => error.accepted(),
            Self::Read { .. } | Self::Convert(_) => 0,
        }
    }
}

/// Outcome of one submission, printed as a json line.
#[derive(Debug, PartialEq, Eq, serde::Serialize)]
pub struct Report {
    /// Input as given on the command line.
    pub input: String,
    /// Trace identifier of the submission.
    pub id: String,
    ///
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    ///
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
    ///
    pub total_accepted_recipients: usize,
    /// Always zero on success, absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rejected_recipients: Option<usize>,
}

impl Report {
    fn new(input: String, id: String, outcome: &Result<usize, SubmissionError>) -> Self {
        match outcome {
            Ok(accepted) => Self {
                input,
                id,
                error: None,
                class: None,
                total_accepted_recipients: *accepted,
                total_rejected_recipients: Some(0),
            },
            Err(error) => Self {
                input,
                id,
                error: Some(error.to_string()),
                class: Some(error.class()),
                total_accepted_recipients: error.accepted(),
                total_rejected_recipients: None,
            },
        }
    }

    /// Did the submission fail.
    #[must_use]
    #[inline]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// What every submission of a run shares.
#[derive(Clone)]
pub struct Context {
    /// Converter applied to every input.
    pub converter: std::sync::Arc<dyn Converter>,
    /// Content type given to the converter.
    pub content_type: Option<String>,
    ///
    pub dispatcher: std::sync::Arc<Dispatcher>,
    /// Cancelled on interruption.
    pub token: CancellationToken,
}

async fn read_input(input: &str) -> std::io::Result<Vec<u8>> {
    if input == "-" {
        let mut out = Vec::new();
        tokio::io::stdin().read_to_end(&mut out).await?;
        Ok(out)
    } else {
        tokio::fs::read(input).await
    }
}

/// Convert `content` and hand the message to the dispatcher.
///
/// # Errors
///
/// * see [`ConvertError`] and [`DispatchError`]
#[inline]
pub async fn deliver(context: &Context, content: Vec<u8>) -> Result<usize, SubmissionError> {
    let mut payload = Payload::from_bytes(content);
    if let Some(content_type) = &context.content_type {
        payload = payload.with_content_type(content_type.as_str());
    }

    let message = context.converter.convert(payload)?;
    tracing::debug!(?message, "payload converted");

    Ok(context
        .dispatcher
        .send(&context.token, Some(message))
        .await?)
}

#[tracing::instrument(name = "submission", skip(context), fields(converter = %context.converter.id()))]
async fn submit(context: Context, input: String, trace_id: String) -> Report {
    let outcome = match read_input(&input).await {
        Ok(content) => deliver(&context, content).await,
        Err(source) => Err(SubmissionError::Read {
            input: input.clone(),
            source,
        }),
    };

    match &outcome {
        Ok(accepted) => tracing::info!(accepted, "submission delivered"),
        Err(error) => tracing::warn!(%error, class = %error.class(), "submission failed"),
    }
    Report::new(input, trace_id, &outcome)
}

/// Submit every input concurrently and return their reports, in input order.
#[inline]
pub async fn run(context: &Context, inputs: Vec<String>) -> Vec<Report> {
    let mut tasks = tokio::task::JoinSet::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let context = context.clone();
        let trace_id = uuid::Uuid::new_v4().to_string();
        tasks.spawn(async move { (index, submit(context, input, trace_id).await) });
    }

    let mut reports = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(error) => tracing::error!(%error, "submission task failed"),
        }
    }
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}

#[cfg(test)]
mod tests {
    use super::{run, Context, Report};
    use smtpgate_common::ErrorClass;
    use smtpgate_delivery::{CancellationToken, Dispatcher};
    use smtpgate_test::relay::FakeRelay;

    async fn context(relay: &FakeRelay, converter: &str) -> Context {
        Context {
            converter: smtpgate_converter::default_registry(1024)
                .get(converter)
                .unwrap(),
            content_type: None,
            dispatcher: std::sync::Arc::new(Dispatcher::connect(&relay.config()).await.unwrap()),
            token: CancellationToken::new(),
        }
    }

    fn input(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("smtpgate-{}-{name}", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test_log::test(tokio::test)]
    async fn reports_in_input_order() {
        let relay = FakeRelay::builder().spawn().await.unwrap();
        let context = context(&relay, "rfc5322").await;

        let first = input(
            "first.eml",
            "From: a@x.com\nTo: b@x.com\nCc: c@x.com\nBcc: d@x.com\n\nbody",
        );
        let second = input("second.eml", "\nnot a message");
        let missing = "/nonexistent/smtpgate/input.eml".to_owned();

        let reports = run(&context, vec![first.clone(), second.clone(), missing.clone()]).await;
        assert_eq!(reports.len(), 3);

        assert_eq!(reports[0].input, first);
        assert!(!reports[0].is_error());
        assert_eq!(reports[0].total_accepted_recipients, 3);
        assert_eq!(reports[0].total_rejected_recipients, Some(0));

        assert_eq!(reports[1].input, second);
        assert_eq!(reports[1].class, Some(ErrorClass::Validation));

        assert_eq!(reports[2].input, missing);
        assert_eq!(reports[2].class, Some(ErrorClass::Invariant));

        let ids = reports.iter().map(|i| i.id.as_str()).collect::<std::collections::HashSet<_>>();
        assert_eq!(ids.len(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn unsupported_content() {
        let relay = FakeRelay::builder().spawn().await.unwrap();
        let context = context(&relay, "sparkpost").await;
        let inline = input(
            "inline.json",
            r#"{"recipients":[{"address":{"email":"r@x.com"}}],"content":{"email_rfc822":""}}"#,
        );

        let reports = run(&context, vec![inline]).await;
        assert_eq!(
            reports[0].error.as_deref(),
            Some("inline content transmission not implemented")
        );
        assert_eq!(reports[0].class, Some(ErrorClass::Unsupported));
        assert_eq!(relay.recording().transcript, ["EHLO gateway.test"]);
    }

    #[test_log::test(tokio::test)]
    async fn transport_failure_reports_accepted() {
        let relay = FakeRelay::builder()
            .reject_recipient("c@x.com")
            .spawn()
            .await
            .unwrap();
        let context = context(&relay, "rfc5322").await;
        let message = input(
            "bcc.eml",
            "From: a@x.com\nTo: b@x.com\nBcc: c@x.com, d@x.com\n\nbody",
        );

        let reports = run(&context, vec![message]).await;
        assert_eq!(reports[0].class, Some(ErrorClass::Transport));
        assert_eq!(reports[0].total_accepted_recipients, 1);
    }

    #[test]
    fn serialize() {
        let report = Report {
            input: "a.eml".to_owned(),
            id: "id".to_owned(),
            error: None,
            class: None,
            total_accepted_recipients: 42,
            total_rejected_recipients: Some(0),
        };
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"input":"a.eml","id":"id","total_accepted_recipients":42,"total_rejected_recipients":0}"#
        );

        let report = Report {
            input: "b.eml".to_owned(),
            id: "id".to_owned(),
            error: Some("message has no recipient".to_owned()),
            class: Some(ErrorClass::Invariant),
            total_accepted_recipients: 0,
            total_rejected_recipients: None,
        };
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"input":"b.eml","id":"id","error":"message has no recipient","class":"invariant","total_accepted_recipients":0}"#
        );
    }
}
