//! Transparent CMS gateway relay and a local B2F mail exchange endpoint,
//! both sub-conversations of an AX.25 session addressed to the WinLink
//! SSID.

mod b2f;
mod checksum;
mod gateway;
mod mail;
mod proposal;
mod relay;
mod relay_log;
mod secure_login;

pub use b2f::{B2fOutcome, B2fServer};
pub use checksum::{checksum, checksum_hex, checksum_matches};
pub use gateway::{RelayMode, RelayModeTracker};
pub use mail::{classify_mailbox, Attachment, Mail, MailFlags, Mailbox};
pub use proposal::{build_fs_line, parse_fs_line, Proposal, ProposalResponse};
pub use relay::{run_relay, CmsTarget, RelayError};
pub use relay_log::{RelayLog, RelayLogEntry};
pub use secure_login::{SecureLoginResponder, UnimplementedResponder};
