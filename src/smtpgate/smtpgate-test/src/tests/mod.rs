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
use smtpgate_converter::{Converter, Payload, Rfc5322};

pub const RAW: &str = "From: a@x.com\nTo: b@x.com\nCc: c@x.com\nBcc: d@x.com\n\nbody\n.hidden line\n";

/// `RAW` as received by the relay: CRLF line endings, transparency dots removed.
pub const RECEIVED: &str =
    "From: a@x.com\r\nTo: b@x.com\r\nCc: c@x.com\r\nBcc: d@x.com\r\n\r\nbody\r\n.hidden line";

/// Content of a recorded `DATA`, without the line breaks before the final dot.
pub fn content(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).trim_end().to_owned()
}

pub fn rfc5322(raw: &str) -> Message {
    Rfc5322::new()
        .convert(Payload::from_bytes(raw))
        .unwrap()
}
