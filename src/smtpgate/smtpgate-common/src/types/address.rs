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

/// Syntactically valid email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(String);

impl std::str::FromStr for Address {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Err(error) = addr::parse_email_address(s) {
            anyhow::bail!("'{s}' is not a valid address: {error}")
        }
        if !s.contains('@') {
            anyhow::bail!("'{s}' is not a valid address: missing '@'")
        }
        Ok(Self(s.to_owned()))
    }
}

impl std::fmt::Display for Address {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the path used in `MAIL FROM` / `RCPT TO` from a header-style value.
///
/// `Bob <bob@example.com>` gives `bob@example.com`, a bare address is returned
/// trimmed.
#[must_use]
#[inline]
pub fn envelope_path(value: &str) -> &str {
    let value = value.trim();
    match (value.rfind('<'), value.rfind('>')) {
        #[allow(clippy::indexing_slicing, clippy::string_slice)]
        (Some(open), Some(close)) if open < close => value[open + 1..close].trim(),
        _ => value,
    }
}
