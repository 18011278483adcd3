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

/// Category of a failure, used by callers to choose a response class.
///
/// `Validation`, `Unsupported`, `Lookup` and `Invariant` are client errors
/// (4xx equivalent), `Transport` is an upstream failure (5xx equivalent).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed payload, failed schema validation or size limit exceeded.
    Validation,
    /// Schema-valid payload outside the supported delivery path.
    Unsupported,
    /// Unknown converter identifier.
    Lookup,
    /// Message that cannot be sent (absent, or without recipient).
    Invariant,
    /// Failure while talking to the relay.
    Transport,
}
