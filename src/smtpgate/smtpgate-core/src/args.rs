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

/// Relay provider email submissions to an SMTP server.
#[derive(Debug, PartialEq, Eq, clap::Parser)]
#[command(about, version, author)]
pub struct Args {
    /// Path of the configuration file (json format)
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Address of the SMTP relay, overrides `relay.addr`
    #[arg(long, env = "SMTP_ADDR")]
    pub smtp_addr: Option<String>,

    /// Comma separated log directives, overrides `logs.level`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Also write the logs on stderr when `logs.filename` is set
    #[arg(long)]
    pub stderr: bool,

    /// Commands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Debug, PartialEq, Eq, clap::Subcommand)]
pub enum Commands {
    /// Print the identifiers of the available converters
    Converters,
    /// Show the loaded config (as serialized json format)
    ConfigShow,
    /// Convert each input and send it to the relay
    Send {
        /// Identifier of the converter to use
        #[arg(short = 'C', long)]
        converter: String,
        /// Content type of the inputs, required by some converters
        #[arg(short = 't', long)]
        content_type: Option<String>,
        /// Files to submit, `-` reads stdin
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Args, Commands};
    use clap::Parser;

    // `SMTP_ADDR` and `LOG_LEVEL` may be set in the environment, both flags
    // are given so the outcome does not depend on it.
    #[test]
    fn parse_arg() {
        assert!(Args::try_parse_from([""]).is_err());

        assert_eq!(
            Args {
                config: Some("path".into()),
                smtp_addr: Some("mx:25".to_owned()),
                log_level: Some("info".to_owned()),
                stderr: false,
                command: Commands::ConfigShow,
            },
            Args::try_parse_from([
                "",
                "-c",
                "path",
                "--smtp-addr",
                "mx:25",
                "--log-level",
                "info",
                "config-show"
            ])
            .unwrap()
        );

        assert_eq!(
            Args {
                config: None,
                smtp_addr: Some("127.0.0.1:2525".to_owned()),
                log_level: Some("trace".to_owned()),
                stderr: true,
                command: Commands::Converters,
            },
            Args::try_parse_from([
                "",
                "--smtp-addr",
                "127.0.0.1:2525",
                "--log-level",
                "trace",
                "--stderr",
                "converters"
            ])
            .unwrap()
        );
    }

    #[rstest::rstest]
    #[case(&["", "send", "-C", "rfc5322", "a.eml", "-"], "rfc5322", None, &["a.eml", "-"])]
    #[case(
        &["", "send", "--converter", "mailgun", "--content-type", "multipart/form-data; boundary=x", "form"],
        "mailgun",
        Some("multipart/form-data; boundary=x"),
        &["form"]
    )]
    fn parse_send(
        #[case] argv: &[&str],
        #[case] converter: &str,
        #[case] content_type: Option<&str>,
        #[case] inputs: &[&str],
    ) {
        pretty_assertions::assert_eq!(
            Args::try_parse_from(argv).unwrap().command,
            Commands::Send {
                converter: converter.to_owned(),
                content_type: content_type.map(str::to_owned),
                inputs: inputs.iter().map(ToString::to_string).collect(),
            }
        );
    }

    #[test]
    fn send_requires_inputs() {
        assert!(Args::try_parse_from(["", "send", "-C", "rfc5322"]).is_err());
        assert!(Args::try_parse_from(["", "send", "a.eml"]).is_err());
    }
}
