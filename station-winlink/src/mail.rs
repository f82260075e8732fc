use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mailbox {
    Inbox = 0,
    Outbox = 1,
    Sent = 3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailFlags {
    pub unread: bool,
    pub private: bool,
    pub p2p: bool,
}

impl MailFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            unread: bits & 0b001 != 0,
            private: bits & 0b010 != 0,
            p2p: bits & 0b100 != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        (self.unread as u8) | ((self.private as u8) << 1) | ((self.p2p as u8) << 2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A decoded WinLink mail item. `mid` is the 12-character message id the
/// B2F protocol uses for dedup on receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub mid: String,
    pub date_time: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub mbo: Option<String>,
    pub location: Option<String>,
    pub mailbox: Mailbox,
    pub flags: MailFlags,
    pub attachments: Vec<Attachment>,
}

/// True if `address` resolves to `our_callsign`, matching either the base
/// callsign or callsign-SSID form.
fn addresses_us(address: &str, our_callsign: &str) -> bool {
    let base = address.split('-').next().unwrap_or(address);
    base.eq_ignore_ascii_case(our_callsign) || address.eq_ignore_ascii_case(our_callsign)
}

/// Classifies a received mail as belonging to our inbox if any `to`/`cc`
/// address resolves to our callsign, outbox otherwise.
pub fn classify_mailbox(to: &[String], cc: &[String], our_callsign: &str) -> Mailbox {
    let addressed_to_us = to
        .iter()
        .chain(cc.iter())
        .any(|address| addresses_us(address, our_callsign));
    if addressed_to_us {
        Mailbox::Inbox
    } else {
        Mailbox::Outbox
    }
}
