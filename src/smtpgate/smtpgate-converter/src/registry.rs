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

use crate::{Converter, ConverterId};
use smtpgate_common::ErrorClass;

/// Lookup failure in the [`Registry`].
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No converter registered under this identifier.
    #[error("converter ID {0} not found")]
    NotFound(String),
}

impl RegistryError {
    /// Category of the error.
    #[inline]
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        ErrorClass::Lookup
    }
}

/// Converters indexed by identifier.
///
/// Filled once at construction, then only read: it can be shared between
/// threads behind an `Arc` without locking.
#[derive(Clone, Default)]
pub struct Registry {
    converters: std::collections::BTreeMap<ConverterId, std::sync::Arc<dyn Converter>>,
}

impl std::fmt::Debug for Registry {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.converters.keys().map(ConverterId::as_str))
            .finish()
    }
}

impl Registry {
    /// Register every converter under its identifier.
    ///
    /// When two converters share an identifier, the last one wins.
    #[inline]
    #[must_use]
    pub fn new(converters: impl IntoIterator<Item = std::sync::Arc<dyn Converter>>) -> Self {
        let mut out = std::collections::BTreeMap::new();
        for converter in converters {
            let id = converter.id();
            if out.insert(id.clone(), converter).is_some() {
                tracing::warn!(%id, "Converter registered twice, keeping the last one.");
            } else {
                tracing::debug!(%id, "Converter registered.");
            }
        }
        Self { converters: out }
    }

    /// Get the converter registered as `id`.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::NotFound`] naming `id`
    #[inline]
    pub fn get(&self, id: &str) -> Result<std::sync::Arc<dyn Converter>, RegistryError> {
        self.converters
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_owned()))
    }

    /// Registered identifiers, sorted.
    #[inline]
    #[must_use]
    pub fn ids(&self) -> Vec<ConverterId> {
        self.converters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Registry, RegistryError};
    use crate::{ConvertError, Converter, ConverterId, Payload, Stub};
    use smtpgate_common::ErrorClass;

    fn stub(id: &str, from: &str) -> std::sync::Arc<dyn Converter> {
        std::sync::Arc::new(Stub::with_recipients(id, from, &["b@x.com"], &[], &[]))
    }

    #[test_log::test]
    fn ids_are_sorted_and_unique() {
        let registry = Registry::new([
            stub("sparkpost", "first"),
            stub("mailgun", ""),
            stub("rfc5322", ""),
            stub("sparkpost", "last"),
        ]);

        pretty_assertions::assert_eq!(
            registry.ids(),
            ["mailgun", "rfc5322", "sparkpost"].map(ConverterId::from)
        );

        let message = registry
            .get("sparkpost")
            .unwrap()
            .convert(Payload::from_bytes("hi"))
            .unwrap();
        assert_eq!(message.from(), "last");
    }

    #[rstest::rstest]
    #[case("")]
    #[case("postmark")]
    #[case("RFC5322")]
    fn not_found(#[case] id: &str) {
        let registry = crate::default_registry(crate::DEFAULT_SIZE_LIMIT);
        let error = registry.get(id).err().unwrap();

        assert_eq!(error, RegistryError::NotFound(id.to_owned()));
        assert_eq!(error.to_string(), format!("converter ID {id} not found"));
        assert_eq!(error.class(), ErrorClass::Lookup);
    }

    #[test]
    fn default_registry() {
        let registry = crate::default_registry(1024);
        pretty_assertions::assert_eq!(
            registry.ids(),
            ["mailgun", "rfc5322", "sparkpost"].map(ConverterId::from)
        );
        assert_eq!(format!("{registry:?}"), r#"{"mailgun", "rfc5322", "sparkpost"}"#);
    }

    #[test]
    fn concurrent_lookups() {
        let registry = std::sync::Arc::new(crate::default_registry(1024));

        let handles = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .get("rfc5322")
                        .unwrap()
                        .convert(Payload::from_bytes("From: a@x.com\nTo: b@x.com\n\nhi"))
                        .map(|message| message.to().to_vec())
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let to: Result<Vec<String>, ConvertError> = handle.join().unwrap();
            assert_eq!(to.unwrap(), vec!["b@x.com".to_owned()]);
        }
    }
}
