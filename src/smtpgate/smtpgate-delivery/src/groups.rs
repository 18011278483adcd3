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

use smtpgate_common::Message;

/// Split the recipients of `message` into transaction groups.
///
/// `to` and `cc` share the first group, then each `bcc` entry gets a group of
/// its own so no `RCPT TO` ever discloses a blind copy to another recipient.
#[must_use]
#[inline]
pub fn build_recipient_groups(message: Option<&Message>) -> Vec<Vec<String>> {
    let Some(message) = message else {
        return vec![];
    };

    let visible = message
        .to()
        .iter()
        .chain(message.cc())
        .cloned()
        .collect::<Vec<_>>();

    let mut groups = Vec::with_capacity(1 + message.bcc().len());
    if !visible.is_empty() {
        groups.push(visible);
    }
    groups.extend(message.bcc().iter().map(|bcc| vec![bcc.clone()]));
    groups
}
