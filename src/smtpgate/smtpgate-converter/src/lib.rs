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

//! smtpgate converters
//!
//! Turn provider specific payloads (raw RFC 5322 message, `SparkPost`
//! transmission, Mailgun multipart form) into a [`smtpgate_common::Message`].

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

mod converter;
mod error;
mod registry;

/// Readers for the formats embedded in the payloads.
pub mod parser {
    pub mod form;
    pub mod headers;
}

mod converters {
    pub mod mailgun;
    pub mod rfc5322;
    pub mod sparkpost;
    #[cfg(any(test, feature = "testing"))]
    pub mod stub;
}

pub use converter::{ConvertResult, Converter, ConverterId, Payload};
pub use converters::{
    mailgun::{Mailgun, DEFAULT_SIZE_LIMIT, MAILGUN_ID},
    rfc5322::{Rfc5322, RFC5322_ID},
    sparkpost::{Content, Recipient, RecipientAddress, SparkPost, Transmission, SPARKPOST_ID},
};
#[cfg(any(test, feature = "testing"))]
pub use converters::stub::Stub;
pub use error::{ConvertError, FieldError, Rule, ValidationErrors};
pub use registry::{Registry, RegistryError};

/// Build the registry of every converter shipped with the gateway.
///
/// `mailgun_size_limit` is the size ceiling of a Mailgun form, in bytes.
#[must_use]
#[inline]
pub fn default_registry(mailgun_size_limit: usize) -> Registry {
    let rfc5322: std::sync::Arc<dyn Converter> = std::sync::Arc::new(Rfc5322::new());

    let converters: [std::sync::Arc<dyn Converter>; 3] = [
        rfc5322.clone(),
        std::sync::Arc::new(SparkPost::new(rfc5322.clone())),
        std::sync::Arc::new(Mailgun::new(rfc5322).with_size_limit(mailgun_size_limit)),
    ];
    Registry::new(converters)
}
