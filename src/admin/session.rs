use crate::admin::types::ConsoleError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Admin session persisted between invocations
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub logged: bool,
    pub username: Option<String>,
    /// Cookie header captured after login
    pub cookies: Option<String>,
    pub api_url: Option<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn logged_in(username: &str, cookies: Option<String>, api_url: &str) -> Self {
        Self {
            logged: true,
            username: Some(username.to_string()),
            cookies,
            api_url: Some(api_url.to_string()),
            saved_at: Some(Utc::now()),
        }
    }

    /// Saved cookies only apply to the server they came from
    pub fn cookies_for(&self, api_url: &str) -> Option<&str> {
        match (&self.api_url, &self.cookies) {
            (Some(saved), Some(cookies)) if saved == api_url => Some(cookies.as_str()),
            _ => None,
        }
    }
}

/// In-memory cache of the last session read or written
static SESSION_CACHE: Mutex<Option<(PathBuf, Session)>> = Mutex::new(None);

fn cached(path: &Path) -> Option<Session> {
    let cache = SESSION_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    cache
        .as_ref()
        .filter(|(cached_path, _)| cached_path == path)
        .map(|(_, session)| session.clone())
}

fn remember(path: &Path, session: Option<&Session>) {
    let mut cache = SESSION_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    *cache = session.map(|s| (path.to_path_buf(), s.clone()));
}

/// Load the session, or a logged-out default when none was saved
pub fn load_session(path: &Path) -> Result<Session, ConsoleError> {
    if let Some(session) = cached(path) {
        return Ok(session);
    }

    if !path.exists() {
        return Ok(Session::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConsoleError::Storage(format!("Failed to read session: {}", e)))?;

    let session: Session = serde_json::from_str(&contents)
        .map_err(|e| ConsoleError::Storage(format!("Failed to parse session: {}", e)))?;

    remember(path, Some(&session));
    Ok(session)
}

pub fn save_session(path: &Path, session: &Session) -> Result<(), ConsoleError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| ConsoleError::Storage(format!("Failed to create session dir: {}", e)))?;
    }

    let json = serde_json::to_string_pretty(session)
        .map_err(|e| ConsoleError::Storage(format!("Failed to serialize session: {}", e)))?;

    std::fs::write(path, json)
        .map_err(|e| ConsoleError::Storage(format!("Failed to write session: {}", e)))?;

    remember(path, Some(session));
    Ok(())
}

/// Forget the cached session without touching the file
pub fn clear_cache() {
    remember(Path::new(""), None);
}

/// Delete the stored session
pub fn clear_session(path: &Path) -> Result<(), ConsoleError> {
    clear_cache();

    if path.exists() {
        std::fs::remove_file(path)
            .map_err(|e| ConsoleError::Storage(format!("Failed to delete session: {}", e)))?;
    }

    Ok(())
}
