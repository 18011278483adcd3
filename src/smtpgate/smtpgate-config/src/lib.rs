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

//! smtpgate configuration

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

mod default;

use anyhow::Context;

/// Configuration of the gateway.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Upstream relay.
    #[serde(default)]
    pub relay: FieldRelay,
    ///
    #[serde(default)]
    pub logs: FieldLogs,
    ///
    #[serde(default)]
    pub converters: FieldConverters,
}

/// Connection to the upstream relay.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRelay {
    /// `host:port` of the relay, required to send.
    #[serde(default)]
    pub addr: Option<String>,
    /// Name given in `EHLO` / `HELO`.
    #[serde(default = "FieldRelay::hostname")]
    pub hello_name: String,
    ///
    #[serde(with = "humantime_serde", default = "FieldRelay::default_connect_timeout")]
    pub connect_timeout: std::time::Duration,
    /// Delay to wait for each reply of the relay.
    #[serde(with = "humantime_serde", default = "FieldRelay::default_io_timeout")]
    pub io_timeout: std::time::Duration,
}

/// Logging system.
#[serde_with::serde_as]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldLogs {
    /// Filter directives, `info` or `smtpgate_delivery=trace` for instance.
    #[serde_as(as = "Vec<serde_with::DisplayFromStr>")]
    #[serde(default = "FieldLogs::default_level")]
    pub level: Vec<tracing_subscriber::filter::Directive>,
    /// Write the logs to this file instead of stderr.
    #[serde(default)]
    pub filename: Option<std::path::PathBuf>,
}

///
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConverters {
    /// Size ceiling of a Mailgun form, in bytes.
    #[serde(default = "FieldConverters::default_mailgun_size_limit")]
    pub mailgun_size_limit: usize,
}

impl Config {
    /// Parse a JSON configuration.
    ///
    /// # Errors
    ///
    /// * the input is not valid JSON, or a field has an invalid value
    #[inline]
    pub fn from_json(input: &str) -> anyhow::Result<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(input);
        serde_path_to_error::deserialize(deserializer)
            .map_err(|error| anyhow::anyhow!("field '{}': {}", error.path(), error.inner()))
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// * the file cannot be read
    /// * see [`Config::from_json`]
    #[inline]
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration at '{}'", path.display()))?;
        Self::from_json(&input)
            .with_context(|| format!("invalid configuration at '{}'", path.display()))
    }

    /// Override the relay address, when provided.
    #[inline]
    #[must_use]
    pub fn with_relay_addr(mut self, addr: Option<String>) -> Self {
        if let Some(addr) = addr {
            self.relay.addr = Some(addr);
        }
        self
    }

    /// Override the log directives with a comma separated list, when provided.
    ///
    /// # Errors
    ///
    /// * a directive is invalid
    #[inline]
    pub fn with_log_level(mut self, level: Option<&str>) -> anyhow::Result<Self> {
        if let Some(level) = level {
            self.logs.level = level
                .split(',')
                .map(str::trim)
                .filter(|directive| !directive.is_empty())
                .map(|directive| {
                    directive
                        .parse()
                        .with_context(|| format!("invalid log directive '{directive}'"))
                })
                .collect::<anyhow::Result<_>>()?;
        }
        Ok(self)
    }

    /// Serialize the configuration for display.
    ///
    /// # Errors
    ///
    /// * serialization failure
    #[inline]
    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("cannot serialize the configuration")
    }
}

impl FieldRelay {
    /// Address of the relay.
    ///
    /// # Errors
    ///
    /// * no address is configured
    #[inline]
    pub fn addr(&self) -> anyhow::Result<&str> {
        match self.addr.as_deref().map(str::trim) {
            Some(addr) if !addr.is_empty() => Ok(addr),
            _ => anyhow::bail!("the relay address is required (`relay.addr` or SMTP_ADDR)"),
        }
    }
}
