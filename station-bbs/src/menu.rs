use crate::bulletin::{Bulletin, BulletinStore};
use crate::connection_log::{ConnectionLog, ConnectionLogEntry};
use crate::files::{self, FileEntry};
use chrono::{TimeZone, Utc};
use station_store::Storage;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Main,
    Games,
    BulletinCreate,
    BulletinDelete,
    Files,
}

/// Side effect the caller must carry out in response to a command; the
/// menu engine itself never touches the network or the filesystem beyond
/// reading the bulletin/connection-log storage and the file listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    StartDownload(PathBuf),
    Disconnect,
}

/// Everything the menu engine needs from the station that it does not own
/// itself: identity, clock, and the APRS record provider (kept decoupled
/// from the APRS handler's storage format).
pub trait BbsContext {
    fn local_callsign(&self) -> &str;
    fn now_ms(&self) -> u64;
    fn last_aprs_messages(&self, count: usize) -> Vec<String>;
    fn pubfiles_root(&self) -> &Path;
}

pub struct BbsSession {
    pub state: MenuState,
    pub caller_callsign: String,
    pub transferring: bool,
}

impl BbsSession {
    pub fn new(caller_callsign: String) -> Self {
        Self {
            state: MenuState::Main,
            caller_callsign,
            transferring: false,
        }
    }

    pub fn welcome(ctx: &dyn BbsContext) -> String {
        format!(
            "{} BBS\r\nLast seen: {}\r\n[M]ENU [T]IME [B]ULL [F]ILES [G]AMES [BYE]\r\n",
            ctx.local_callsign(),
            format_time(ctx.now_ms()),
        )
    }

    /// Processes one line of caller input, returning the text to send back
    /// and any side effect the caller of this engine must carry out.
    ///
    /// While `transferring` is true the caller must route inbound bytes to
    /// the active YAPP transfer instead of calling this method at all.
    pub fn on_command(&mut self, ctx: &dyn BbsContext, storage: &Storage, line: &str) -> (String, Action) {
        let trimmed = line.trim();
        match self.state {
            MenuState::BulletinCreate => {
                self.state = MenuState::Main;
                let bulletins = BulletinStore::new(storage);
                match bulletins.create(&self.caller_callsign, trimmed, ctx.now_ms()) {
                    Ok(_) => ("Bulletin posted.\r\n".to_string(), Action::None),
                    Err(e) => (format!("{e}\r\n"), Action::None),
                }
            }
            MenuState::BulletinDelete => {
                self.state = MenuState::Main;
                match trimmed.parse::<u64>() {
                    Ok(id) => {
                        let bulletins = BulletinStore::new(storage);
                        match bulletins.delete(&self.caller_callsign, id) {
                            Ok(()) => ("Bulletin deleted.\r\n".to_string(), Action::None),
                            Err(e) => (format!("{e}\r\n"), Action::None),
                        }
                    }
                    Err(_) => ("Not a valid bulletin id.\r\n".to_string(), Action::None),
                }
            }
            MenuState::Files => self.handle_files_command(ctx, trimmed),
            MenuState::Games => {
                if trimmed.eq_ignore_ascii_case("m") || trimmed.eq_ignore_ascii_case("menu") {
                    self.state = MenuState::Main;
                    (main_menu_text(), Action::None)
                } else {
                    ("Unknown game command.\r\n".to_string(), Action::None)
                }
            }
            MenuState::Main => self.handle_main_command(ctx, storage, trimmed),
        }
    }

    fn handle_main_command(&mut self, ctx: &dyn BbsContext, storage: &Storage, command: &str) -> (String, Action) {
        let lower = command.to_ascii_lowercase();
        match lower.as_str() {
            "m" | "menu" => (main_menu_text(), Action::None),
            "t" | "time" => (format!("{}\r\n", format_time(ctx.now_ms())), Action::None),
            "uptime" => (format!("Up {} ms\r\n", ctx.now_ms()), Action::None),
            "lc" => {
                let log = ConnectionLog::new(storage);
                let entries = log.last(20).unwrap_or_default();
                (render_connections(&entries), Action::None)
            }
            "aprsmsgs" => {
                let lines = ctx.last_aprs_messages(20);
                (render_lines(&lines), Action::None)
            }
            "b" | "bull" => {
                let bulletins = BulletinStore::new(storage);
                let live = bulletins.list_live(ctx.now_ms()).unwrap_or_default();
                (render_bulletins(&live), Action::None)
            }
            "newb" => {
                self.state = MenuState::BulletinCreate;
                ("Enter bulletin text:\r\n".to_string(), Action::None)
            }
            "delb" => {
                self.state = MenuState::BulletinDelete;
                ("Enter bulletin id to delete:\r\n".to_string(), Action::None)
            }
            "f" | "files" => {
                self.state = MenuState::Files;
                let list = files::list_files(ctx.pubfiles_root());
                (render_files(&list), Action::None)
            }
            "g" | "games" => {
                self.state = MenuState::Games;
                ("Entering games menu.\r\n".to_string(), Action::None)
            }
            "bye" => ("73!\r\n".to_string(), Action::Disconnect),
            _ if lower.starts_with("download ") => {
                let name = command["download ".len()..].trim();
                self.handle_download(ctx, name)
            }
            _ => ("Unknown command. Try M for menu.\r\n".to_string(), Action::None),
        }
    }

    fn handle_files_command(&mut self, ctx: &dyn BbsContext, command: &str) -> (String, Action) {
        let lower = command.to_ascii_lowercase();
        if lower == "m" || lower == "menu" {
            self.state = MenuState::Main;
            return (main_menu_text(), Action::None);
        }
        if lower.starts_with("download ") {
            let name = command["download ".len()..].trim();
            return self.handle_download(ctx, name);
        }
        ("Type 'download <name>' or M for menu.\r\n".to_string(), Action::None)
    }

    fn handle_download(&mut self, ctx: &dyn BbsContext, name: &str) -> (String, Action) {
        match files::resolve(ctx.pubfiles_root(), name) {
            Some(path) => {
                self.transferring = true;
                self.state = MenuState::Main;
                (String::new(), Action::StartDownload(path))
            }
            None => (format!("File not found: {name}\r\n"), Action::None),
        }
    }

    /// Called by the caller once the active YAPP transfer finishes, is
    /// cancelled, or is aborted, to return the session to the main menu.
    pub fn transfer_finished(&mut self, notice: &str) -> String {
        self.transferring = false;
        self.state = MenuState::Main;
        format!("{notice}\r\n{}", main_menu_text())
    }
}

fn main_menu_text() -> String {
    "[M]ENU [T]IME [UPTIME] [LC] [APRSMSGS] [B]ULL [NEWB] [DELB] [F]ILES [G]AMES [BYE]\r\n".to_string()
}

fn format_time(now_ms: u64) -> String {
    Utc.timestamp_millis_opt(now_ms as i64)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn render_bulletins(bulletins: &[Bulletin]) -> String {
    if bulletins.is_empty() {
        return "No bulletins.\r\n".to_string();
    }
    let mut out = String::new();
    for b in bulletins {
        out.push_str(&format!("#{} {}: {}\r\n", b.id, b.callsign, b.message));
    }
    out
}

fn render_connections(entries: &[ConnectionLogEntry]) -> String {
    if entries.is_empty() {
        return "No connections logged.\r\n".to_string();
    }
    let mut out = String::new();
    for e in entries.iter().rev() {
        out.push_str(&format!("{} @ {}\r\n", e.callsign, format_time(e.connect_time_ms)));
    }
    out
}

fn render_files(files: &[FileEntry]) -> String {
    if files.is_empty() {
        return "No files available.\r\n".to_string();
    }
    let mut out = String::new();
    for f in files {
        out.push_str(&format!("{} ({} bytes)\r\n", f.relative_path, f.size));
    }
    out
}

fn render_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return "No records.\r\n".to_string();
    }
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCtx {
        root: PathBuf,
    }
    impl BbsContext for TestCtx {
        fn local_callsign(&self) -> &str {
            "KK7VZT-2"
        }
        fn now_ms(&self) -> u64 {
            1_000
        }
        fn last_aprs_messages(&self, _count: usize) -> Vec<String> {
            Vec::new()
        }
        fn pubfiles_root(&self) -> &Path {
            &self.root
        }
    }

    #[test]
    fn menu_command_shows_time_shorthand() {
        let ctx = TestCtx {
            root: std::env::temp_dir(),
        };
        let storage = Storage::open_in_memory().unwrap();
        let mut session = BbsSession::new("W1AW".to_string());
        let (text, action) = session.on_command(&ctx, &storage, "t");
        assert_eq!(action, Action::None);
        assert!(text.contains("UTC"));
    }

    #[test]
    fn newb_then_text_posts_exactly_one_bulletin() {
        let ctx = TestCtx {
            root: std::env::temp_dir(),
        };
        let storage = Storage::open_in_memory().unwrap();
        let mut session = BbsSession::new("W1AW".to_string());
        let (_, action) = session.on_command(&ctx, &storage, "newb");
        assert_eq!(action, Action::None);
        assert_eq!(session.state, MenuState::BulletinCreate);
        let (text, _) = session.on_command(&ctx, &storage, "Test bulletin");
        assert!(text.contains("posted"));
        let (listing, _) = session.on_command(&ctx, &storage, "b");
        assert_eq!(listing.lines().count(), 1);
    }

    #[test]
    fn download_of_missing_file_reports_not_found() {
        let ctx = TestCtx {
            root: std::env::temp_dir().join("nonexistent-pubfiles-dir"),
        };
        let storage = Storage::open_in_memory().unwrap();
        let mut session = BbsSession::new("W1AW".to_string());
        let (text, action) = session.on_command(&ctx, &storage, "download htstation-manual.txt");
        assert_eq!(action, Action::None);
        assert!(text.contains("not found") || text.contains("File not found"));
    }

    #[test]
    fn bye_requests_disconnect() {
        let ctx = TestCtx {
            root: std::env::temp_dir(),
        };
        let storage = Storage::open_in_memory().unwrap();
        let mut session = BbsSession::new("W1AW".to_string());
        let (_, action) = session.on_command(&ctx, &storage, "bye");
        assert_eq!(action, Action::Disconnect);
    }
}

