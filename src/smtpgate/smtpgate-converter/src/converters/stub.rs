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

use crate::{ConvertResult, Converter, ConverterId, Payload};
use smtpgate_common::Message;

type Handler = dyn Fn(Payload) -> ConvertResult<Message> + Send + Sync;

/// Converter whose behavior is provided by a closure.
pub struct Stub {
    id: ConverterId,
    handler: Box<Handler>,
}

impl std::fmt::Debug for Stub {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Stub {
    /// Create a stub registered as `id`.
    #[inline]
    #[must_use]
    pub fn new(
        id: &str,
        handler: impl Fn(Payload) -> ConvertResult<Message> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: ConverterId::from(id),
            handler: Box::new(handler),
        }
    }

    /// Stub answering every payload with a message made of these fields,
    /// the payload body becoming the message content.
    #[inline]
    #[must_use]
    pub fn with_recipients(id: &str, from: &str, to: &[&str], cc: &[&str], bcc: &[&str]) -> Self {
        let own = |list: &[&str]| list.iter().map(ToString::to_string).collect::<Vec<_>>();
        let (from, to, cc, bcc) = (from.to_owned(), own(to), own(cc), own(bcc));

        Self::new(id, move |payload| {
            Ok(Message::new(
                from.clone(),
                to.clone(),
                cc.clone(),
                bcc.clone(),
                payload.into_body(),
            ))
        })
    }
}

impl Converter for Stub {
    #[inline]
    fn id(&self) -> ConverterId {
        self.id.clone()
    }

    #[inline]
    fn convert(&self, payload: Payload) -> ConvertResult<Message> {
        (self.handler)(payload)
    }
}
