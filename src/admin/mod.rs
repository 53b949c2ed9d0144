// Admin console: API client, request normalization and credential management

pub mod types;
pub mod config;
pub mod transport;
pub mod request;
pub mod api;
pub mod keygen;
pub mod users;
pub mod session;
pub mod manager;

#[cfg(test)]
pub(crate) mod testing;

pub use types::*;
pub use config::ConsoleConfig;
pub use manager::Console;
