use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    Bbs,
    Echo,
    WinLink,
}

/// Arbitrates which server kind owns a connected session with a given
/// remote callsign. A callsign can only be talking to one server kind at
/// a time; a second server attempting to claim the same callsign for a
/// different kind is rejected.
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, ServerKind>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// True iff no entry exists for `callsign`, or the existing entry
    /// already matches `kind`.
    pub fn can_create_session(&self, callsign: &str, kind: ServerKind) -> bool {
        match self.entries.lock().get(callsign) {
            Some(existing) => *existing == kind,
            None => true,
        }
    }

    /// Claims `callsign` for `kind`. Callers must check
    /// `can_create_session` first; this does not itself enforce exclusivity.
    pub fn register(&self, callsign: &str, kind: ServerKind) {
        self.entries.lock().insert(callsign.to_string(), kind);
    }

    pub fn unregister(&self, callsign: &str) {
        self.entries.lock().remove(callsign);
    }

    pub fn kind_of(&self, callsign: &str) -> Option<ServerKind> {
        self.entries.lock().get(callsign).copied()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
