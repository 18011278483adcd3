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

use crate::{FieldConverters, FieldLogs, FieldRelay};

impl Default for FieldRelay {
    fn default() -> Self {
        Self {
            addr: None,
            hello_name: Self::hostname(),
            connect_timeout: Self::default_connect_timeout(),
            io_timeout: Self::default_io_timeout(),
        }
    }
}

impl FieldRelay {
    pub(crate) fn hostname() -> String {
        hostname::get()
            .ok()
            .map(|name| name.to_string_lossy().trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_owned())
    }

    pub(crate) const fn default_connect_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(5)
    }

    pub(crate) const fn default_io_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(30)
    }
}

impl Default for FieldLogs {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            filename: None,
        }
    }
}

impl FieldLogs {
    pub(crate) fn default_level() -> Vec<tracing_subscriber::filter::Directive> {
        vec![tracing_subscriber::filter::LevelFilter::INFO.into()]
    }
}

impl Default for FieldConverters {
    fn default() -> Self {
        Self {
            mailgun_size_limit: Self::default_mailgun_size_limit(),
        }
    }
}

impl FieldConverters {
    pub(crate) const fn default_mailgun_size_limit() -> usize {
        25 * 1024 * 1024
    }
}
