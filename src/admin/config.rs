use crate::admin::types::ConsoleError;
use std::path::PathBuf;
use std::time::Duration;

/// Admin API base URL used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Request timeout in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 6000;

/// Backend business success code
pub const SUCCESS_CODE: i64 = 200;

/// Code synthesized when no HTTP status is available
pub const FALLBACK_ERROR_CODE: i64 = 500;

/// Table page size used by the credential list
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Content type for every request body
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// User-facing messages
pub mod messages {
    pub const OPERATION_SUCCEEDED: &str = "Operation succeeded";
    pub const NETWORK_ERROR: &str = "Network error, please check your network";
    pub const SYSTEM_EXCEPTION: &str = "System exception";
    pub const FORM_INCOMPLETE: &str = "Please complete the required fields or fix the errors";
}

/// Session storage
pub const SESSION_DIR_NAME: &str = "appkey-console";
pub const SESSION_FILE_NAME: &str = "session.json";

/// Environment variables
pub mod env_vars {
    pub const API_URL: &str = "APPKEY_API_URL";
    pub const TIMEOUT_MS: &str = "APPKEY_TIMEOUT_MS";
    pub const SESSION_FILE: &str = "APPKEY_SESSION_FILE";
    pub const PAGE_SIZE: &str = "APPKEY_PAGE_SIZE";
}

/// API endpoints (paths relative to the configured base URL)
pub mod endpoints {
    pub const ADMIN_LOGIN: &str = "/api/admin/login";
    pub const ADMIN_LOGOUT: &str = "/api/admin/logout";

    pub const APP_LIST: &str = "/api/app/getlist";
    pub const APP_ADD: &str = "/api/app/add";
    pub const APP_INFO: &str = "/api/app/getinfo";
    pub const APP_SET: &str = "/api/app/set";
    pub const APP_SET_KEYS: &str = "/api/app/setkeys";
    pub const APP_SET_CONFIG: &str = "/api/app/setconfig";
    pub const APP_DELETE: &str = "/api/app/del";

    pub const USER_LIST: &str = "/api/user/getlist";
    pub const USER_ADD: &str = "/api/user/add";
    pub const USER_DELETE: &str = "/api/user/del";
    pub const USER_INFO: &str = "/api/user/getinfo";
    pub const USER_SET: &str = "/api/user/set";
}

/// Runtime configuration for the console
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub session_path: PathBuf,
    pub page_size: usize,
}

impl ConsoleConfig {
    /// Build configuration from the environment, falling back to defaults.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self, ConsoleError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConsoleError> {
        let api_url = lookup(env_vars::API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_ms = match lookup(env_vars::TIMEOUT_MS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ConsoleError::Config(format!(
                    "{} must be a number of milliseconds",
                    env_vars::TIMEOUT_MS
                ))
            })?,
            None => REQUEST_TIMEOUT_MS,
        };

        let page_size = match lookup(env_vars::PAGE_SIZE) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    let name = env_vars::PAGE_SIZE;
                    ConsoleError::Config(format!("{} must be a positive number", name))
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        let session_path = match lookup(env_vars::SESSION_FILE) {
            Some(path) => PathBuf::from(path),
            None => default_session_path()?,
        };

        Ok(Self {
            api_url: normalize_base_url(&api_url),
            timeout: Duration::from_millis(timeout_ms),
            session_path,
            page_size,
        })
    }

    /// Replace the base URL (CLI override)
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = normalize_base_url(api_url);
        self
    }
}

/// Default location of the session file under the user's config dir
pub fn default_session_path() -> Result<PathBuf, ConsoleError> {
    let base = dirs::config_dir()
        .ok_or_else(|| ConsoleError::Config("Could not determine config directory".to_string()))?;
    Ok(base.join(SESSION_DIR_NAME).join(SESSION_FILE_NAME))
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
