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

use anyhow::Context;
use smtpgate::{
    submission::{self, Report},
    Args, Commands,
};

fn main() -> std::process::ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("smtpgate: {error:?}");
            tracing::error!(%error, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<std::process::ExitCode> {
    if let Err(error) = dotenv::dotenv() {
        if !error.not_found() {
            return Err(error).context("cannot load the .env file");
        }
    }

    let args = <Args as clap::Parser>::parse();
    let config = smtpgate::load_config(&args)?;

    let registry = smtpgate_converter::default_registry(config.converters.mailgun_size_limit);

    match &args.command {
        Commands::ConfigShow => {
            println!("{}", config.to_json_pretty()?);
            Ok(std::process::ExitCode::SUCCESS)
        }
        Commands::Converters => {
            for id in registry.ids() {
                println!("{id}");
            }
            Ok(std::process::ExitCode::SUCCESS)
        }
        Commands::Send {
            converter,
            content_type,
            inputs,
        } => {
            smtpgate::init_logs(&args, &config)?;
            let converter = registry.get(converter)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("smtpgate")
                .build()
                .context("cannot start the async runtime")?;

            runtime.block_on(async move {
                let dispatcher = smtpgate_delivery::Dispatcher::connect(&config.relay)
                    .await
                    .context("the smtp relay is required to deliver messages")?;

                let context = submission::Context {
                    converter,
                    content_type: content_type.clone(),
                    dispatcher: std::sync::Arc::new(dispatcher),
                    token: smtpgate_delivery::CancellationToken::new(),
                };

                let interrupt = tokio::spawn({
                    let token = context.token.clone();
                    async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            tracing::warn!("interrupted, cancelling the pending submissions");
                            token.cancel();
                        }
                    }
                });

                let reports = submission::run(&context, inputs.clone()).await;
                interrupt.abort();

                for report in &reports {
                    println!("{}", serde_json::to_string(report)?);
                }

                let closed = context.dispatcher.close().await;
                if let Err(error) = &closed {
                    tracing::error!(%error, "failed to close the relay connection");
                }

                Ok::<_, anyhow::Error>(
                    if closed.is_err() || reports.iter().any(Report::is_error) {
                        std::process::ExitCode::FAILURE
                    } else {
                        std::process::ExitCode::SUCCESS
                    },
                )
            })
        }
    }
}
