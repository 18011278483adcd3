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

//! smtpgate executable

#![doc(html_no_source)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
//
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
//
#![allow(clippy::multiple_crate_versions)]

mod args;
pub mod submission;

pub use args::{Args, Commands};

use anyhow::Context;

#[cfg(debug_assertions)]
macro_rules! get_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(true)
            .with_ansi(false)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! get_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_thread_ids(false)
            .with_target(false)
            .with_ansi(false)
    };
}

macro_rules! file_writer {
    ($filename:expr) => {{
        let filename: &std::path::Path = $filename;
        let writer_backend = if let (Some(directory), Some(file_name)) = (
            filename.parent(),
            filename.file_name().and_then(std::ffi::OsStr::to_str),
        ) {
            tracing_appender::rolling::never(directory, file_name)
        } else {
            anyhow::bail!(
                "filepath at '{}' does not have a parent or is not valid",
                filename.display()
            )
        };

        get_fmt!().with_writer(writer_backend)
    }};
}

/// Load the configuration file if any, then apply the command line and
/// environment overrides.
///
/// # Errors
///
/// * the file cannot be read or is invalid
/// * the log directives are invalid
#[inline]
pub fn load_config(args: &Args) -> anyhow::Result<smtpgate_config::Config> {
    let config = match &args.config {
        Some(path) => smtpgate_config::Config::from_path(path)?,
        None => smtpgate_config::Config::default(),
    };

    config
        .with_relay_addr(args.smtp_addr.clone())
        .with_log_level(args.log_level.as_deref())
        .context("invalid log level")
}

/// Initialize the tracing subsystem.
///
/// Logs go to `logs.filename` when set, to stderr otherwise.
///
/// # Errors
///
/// * the log file path is invalid
/// * a global subscriber is already installed
#[inline]
pub fn init_logs(args: &Args, config: &smtpgate_config::Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let subscriber = tracing_subscriber::registry().with({
        let mut e = tracing_subscriber::EnvFilter::default();
        for i in &config.logs.level {
            e = e.add_directive(i.clone());
        }
        e
    });

    match &config.logs.filename {
        Some(filename) if args.stderr => subscriber
            .with(file_writer!(filename))
            .with(get_fmt!().with_writer(std::io::stderr).with_ansi(true))
            .try_init(),
        Some(filename) => subscriber.with(file_writer!(filename)).try_init(),
        None => subscriber
            .with(get_fmt!().with_writer(std::io::stderr))
            .try_init(),
    }?;

    tracing::info!(
        file = ?config.logs.filename,
        stderr = args.stderr || config.logs.filename.is_none(),
        "smtpgate logs initialized"
    );

    Ok(())
}
