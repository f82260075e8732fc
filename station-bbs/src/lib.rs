//! BBS command/menu engine: bulletin CRUD, connection log, file listing,
//! and YAPP-backed file download, layered on an already-open AX.25
//! session.

mod bulletin;
mod connection_log;
mod files;
mod menu;

pub use bulletin::{Bulletin, BulletinError, BulletinStore};
pub use connection_log::{ConnectionLog, ConnectionLogEntry};
pub use files::{list_files, resolve, FileEntry};
pub use menu::{Action, BbsContext, BbsSession, MenuState};
