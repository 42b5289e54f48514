//! Session codes and the live-session registry
//!
//! Sessions are identified by short codes displayed in octal format to
//! make them easier to communicate verbally. The registry owns every
//! live session and evicts the ones nobody is coming back to: a
//! session whose last participant disconnected gets a grace period for
//! reconnects, and a completed session is retained for a while so late
//! readers can still fetch the summary.

use std::{
    fmt::Display,
    num::ParseIntError,
    str::FromStr,
    sync::{Arc, Mutex},
};

use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use web_time::{Duration, Instant};

use crate::{
    game::{Game, Options},
    participant::Id,
};

/// Minimum value for generated session codes (in octal: 10000)
const MIN_VALUE: u16 = 0o10_000;
/// Maximum value for generated session codes (in octal: 100000)
const MAX_VALUE: u16 = 0o100_000;

/// How many random codes to try before giving up on a create
const CODE_ATTEMPTS: usize = 64;

/// A unique identifier for a session
///
/// Codes are generated randomly within a range that always displays as
/// a 5-digit octal number, which reduces confusion when sharing codes
/// verbally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameCode(u16);

impl GameCode {
    /// Creates a new random session code
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for GameCode {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameCode {
    /// Formats the code as a 5-digit octal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05o}", self.0)
    }
}

impl Serialize for GameCode {
    /// Serializes the code as an octal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GameCode {
    /// Deserializes a code from an octal string
    fn deserialize<D>(deserializer: D) -> Result<GameCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        GameCode::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for GameCode {
    type Err = ParseIntError;

    /// Parses a code from its octal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string is not a valid octal
    /// number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}

/// Errors from registry operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Could not find a vacant code for a new session
    #[error("no session codes available")]
    OutOfCodes,
}

/// One live session and its activity clocks
struct SessionEntry {
    /// The session itself, shared with connection handlers
    game: Arc<Mutex<Game>>,
    /// Last time anyone touched the session
    last_active: Instant,
    /// Set while the session has no connected participants
    vacated_at: Option<Instant>,
}

impl SessionEntry {
    fn new(game: Game) -> Self {
        Self {
            game: Arc::new(Mutex::new(game)),
            last_active: Instant::now(),
            vacated_at: None,
        }
    }
}

/// The set of live sessions, indexed by code
#[derive(Default)]
pub struct Registry {
    sessions: DashMap<GameCode, SessionEntry>,
}

impl Registry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new session and returns its code
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfCodes`] if no vacant code was found after
    /// a bounded number of attempts, which only happens when the
    /// registry is nearly saturated.
    pub fn create(&self, options: Options, host_id: Id) -> Result<GameCode, Error> {
        for _ in 0..CODE_ATTEMPTS {
            let code = GameCode::new();
            match self.sessions.entry(code) {
                dashmap::mapref::entry::Entry::Occupied(_) => {}
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(SessionEntry::new(Game::new(options.clone(), host_id)));
                    tracing::info!(%code, "session created");
                    return Ok(code);
                }
            }
        }
        tracing::warn!("could not find a vacant session code");
        Err(Error::OutOfCodes)
    }

    /// Fetches the session with this code, creating it first if none
    /// exists, and refreshes its activity clock
    pub fn get_or_create(
        &self,
        code: GameCode,
        options: Options,
        host_id: Id,
    ) -> Arc<Mutex<Game>> {
        let mut entry = self.sessions.entry(code).or_insert_with(|| {
            tracing::info!(%code, "session created");
            SessionEntry::new(Game::new(options, host_id))
        });
        entry.last_active = Instant::now();
        entry.vacated_at = None;
        Arc::clone(&entry.game)
    }

    /// Fetches a session by code, refreshing its activity clock and
    /// ending any pending grace period
    pub fn get(&self, code: GameCode) -> Option<Arc<Mutex<Game>>> {
        self.sessions.get_mut(&code).map(|mut entry| {
            entry.last_active = Instant::now();
            entry.vacated_at = None;
            Arc::clone(&entry.game)
        })
    }

    /// Whether a session with this code exists
    pub fn exists(&self, code: GameCode) -> bool {
        self.sessions.contains_key(&code)
    }

    /// Starts the reconnect grace period for a session whose last
    /// participant disconnected
    pub fn mark_vacated(&self, code: GameCode) {
        if let Some(mut entry) = self.sessions.get_mut(&code) {
            if entry.vacated_at.is_none() {
                tracing::debug!(%code, "session vacated");
                entry.vacated_at = Some(Instant::now());
            }
        }
    }

    /// Removes a session immediately
    pub fn remove(&self, code: GameCode) {
        if self.sessions.remove(&code).is_some() {
            tracing::info!(%code, "session removed");
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evicts sessions nobody is coming back to and returns how many
    /// were removed
    ///
    /// A session is evicted once its grace period elapses with no
    /// reconnect, or once it is complete and idle beyond the retention
    /// window.
    pub fn evict_idle(&self, grace: Duration, retention: Duration) -> usize {
        let before = self.sessions.len();
        let now = Instant::now();

        self.sessions.retain(|code, entry| {
            let grace_expired = entry
                .vacated_at
                .is_some_and(|at| now.duration_since(at) >= grace);
            let finished = entry
                .game
                .lock()
                .map(|game| game.is_complete())
                .unwrap_or(true);
            let retired = finished && now.duration_since(entry.last_active) >= retention;

            if grace_expired || retired {
                tracing::info!(%code, "session evicted");
                false
            } else {
                true
            }
        });

        before.saturating_sub(self.sessions.len())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        game::{SyncMessage, UpdateMessage},
        session::Tunnel,
    };

    struct NullTunnel;

    impl Tunnel for NullTunnel {
        fn send_message(&self, _message: &UpdateMessage) {}

        fn send_state(&self, _state: &SyncMessage) {}

        fn close(self) {}
    }

    #[test]
    fn test_code_displays_as_five_octal_digits() {
        for _ in 0..100 {
            let code = GameCode::new();
            let text = code.to_string();
            assert_eq!(text.len(), 5);
            assert!(text.chars().all(|c| ('0'..='7').contains(&c)));
        }
    }

    #[test]
    fn test_code_roundtrips_through_display() {
        let code = GameCode::new();
        assert_eq!(GameCode::from_str(&code.to_string()), Ok(code));
    }

    #[test]
    fn test_code_serializes_as_string() {
        let code = GameCode::from_str("12345").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"12345\"");
        let parsed: GameCode = serde_json::from_str("\"12345\"").unwrap();
        assert_eq!(parsed, code);
    }

    #[test]
    fn test_code_rejects_non_octal() {
        assert!(GameCode::from_str("12389").is_err());
        assert!(GameCode::from_str("not a code").is_err());
    }

    #[test]
    fn test_create_and_get() {
        let registry = Registry::new();
        let code = registry.create(Options::default(), Id::new()).unwrap();

        assert!(registry.exists(code));
        assert!(registry.get(code).is_some());
        assert_eq!(registry.len(), 1);

        registry.remove(code);
        assert!(!registry.exists(code));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_create_reuses_existing_session() {
        let registry = Registry::new();
        let code = GameCode::from_str("23456").unwrap();
        let host = Id::new();

        let first = registry.get_or_create(code, Options::default(), host);
        let second = registry.get_or_create(code, Options::default(), Id::new());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().unwrap().host_id(), host);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_unknown_code_is_none() {
        let registry = Registry::new();
        assert!(registry.get(GameCode::new()).is_none());
    }

    #[test]
    fn test_vacated_session_evicted_after_grace() {
        let registry = Registry::new();
        let code = registry.create(Options::default(), Id::new()).unwrap();
        let occupied = registry.create(Options::default(), Id::new()).unwrap();

        registry.mark_vacated(code);
        let evicted = registry.evict_idle(Duration::ZERO, Duration::from_secs(3600));

        assert_eq!(evicted, 1);
        assert!(!registry.exists(code));
        assert!(registry.exists(occupied));
    }

    #[test]
    fn test_reconnect_cancels_grace_period() {
        let registry = Registry::new();
        let code = registry.create(Options::default(), Id::new()).unwrap();

        registry.mark_vacated(code);
        // fetching the session counts as a reconnect
        let _session = registry.get(code).unwrap();

        let evicted = registry.evict_idle(Duration::ZERO, Duration::from_secs(3600));
        assert_eq!(evicted, 0);
        assert!(registry.exists(code));
    }

    #[test]
    fn test_completed_session_evicted_after_retention() {
        let registry = Registry::new();
        let code = registry.create(Options::default(), Id::new()).unwrap();

        {
            let session = registry.get(code).unwrap();
            let mut game = session.lock().unwrap();
            game.shut_down(|_| None::<NullTunnel>);
        }

        // an ongoing session survives a zero retention window
        let other = registry.create(Options::default(), Id::new()).unwrap();

        let evicted = registry.evict_idle(Duration::from_secs(3600), Duration::ZERO);
        assert_eq!(evicted, 1);
        assert!(!registry.exists(code));
        assert!(registry.exists(other));
    }
}
