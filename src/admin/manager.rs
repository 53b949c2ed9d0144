use crate::admin::api::{AdminApi, LoginRequest, SetAppRequest};
use crate::admin::config::messages::FORM_INCOMPLETE;
use crate::admin::config::ConsoleConfig;
use crate::admin::request::{Notifier, Requester};
use crate::admin::session::{clear_session, load_session, save_session, Session};
use crate::admin::transport::HttpTransport;
use crate::admin::types::{ConsoleError, CredentialStatus};
use crate::admin::users::{CredentialList, CredentialUpdate};
use std::sync::Arc;

/// Optional app edits; unset fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct AppChanges {
    pub description: Option<String>,
    pub notice: Option<String>,
    pub status: Option<String>,
}

/// Optional credential edits; unset fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct CredentialChanges {
    pub status: Option<CredentialStatus>,
    pub description: Option<String>,
    /// `Some(0)` clears the expiry
    pub end_time: Option<i64>,
}

/// Wires configuration, session, transport and API together
pub struct Console {
    config: ConsoleConfig,
    transport: Arc<HttpTransport>,
    notifier: Arc<dyn Notifier>,
    api: AdminApi,
}

impl Console {
    pub fn new(config: ConsoleConfig, notifier: Arc<dyn Notifier>) -> Result<Self, ConsoleError> {
        let transport = Arc::new(HttpTransport::new(&config)?);

        let session = load_session(&config.session_path)?;
        if let Some(cookies) = session.cookies_for(&config.api_url) {
            transport.restore_cookies(cookies)?;
        }

        let requester = Requester::new(transport.clone(), Arc::clone(&notifier));
        let api = AdminApi::new(Arc::new(requester));

        Ok(Self {
            config,
            transport,
            notifier,
            api,
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn api(&self) -> &AdminApi {
        &self.api
    }

    /// Fresh credential list controller
    pub fn credentials(&self) -> CredentialList {
        CredentialList::new(self.api.clone(), self.config.page_size)
    }

    pub fn session(&self) -> Result<Session, ConsoleError> {
        load_session(&self.config.session_path)
    }

    pub fn require_login(&self) -> Result<Session, ConsoleError> {
        let session = self.session()?;
        if session.logged {
            Ok(session)
        } else {
            Err(ConsoleError::NotLoggedIn)
        }
    }

    /// Log in and persist the session; nothing is saved on failure
    pub async fn login(&self, username: &str, password: &str) -> Result<bool, ConsoleError> {
        if username.trim().is_empty() || password.is_empty() {
            self.notifier.error(FORM_INCOMPLETE);
            return Err(ConsoleError::Validation(FORM_INCOMPLETE.to_string()));
        }

        let request = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let result = self.api.login(&request).await;
        if !result.success {
            tracing::info!(username = %request.username, "login rejected");
            return Ok(false);
        }

        let session = Session::logged_in(
            &request.username,
            self.transport.cookie_header(),
            &self.config.api_url,
        );
        save_session(&self.config.session_path, &session)?;
        tracing::info!(username = %request.username, "logged in");
        Ok(true)
    }

    /// Log out and drop the stored session
    pub async fn logout(&self) -> Result<bool, ConsoleError> {
        let result = self.api.logout().await;
        if result.success {
            clear_session(&self.config.session_path)?;
        }
        Ok(result.success)
    }

    /// Fetch the app, apply the changes and save
    pub async fn update_app(&self, appid: u64, changes: AppChanges) -> bool {
        let Some(current) = self.api.app_info(appid).await.ok() else {
            return false;
        };

        let request = SetAppRequest {
            id: appid,
            description: changes.description.unwrap_or(current.description),
            notice: changes.notice.unwrap_or(current.notice),
            status: changes.status.unwrap_or(current.status),
        };
        self.api.set_app(&request).await.success
    }

    /// Fetch the credential, apply the changes and save through `list`
    pub async fn update_credential(
        &self,
        list: &CredentialList,
        userid: u64,
        changes: CredentialChanges,
    ) -> bool {
        let Some(current) = list.detail(userid).await.ok() else {
            return false;
        };

        let update = CredentialUpdate {
            status: changes.status.unwrap_or(current.status),
            description: changes.description.unwrap_or(current.description),
            end_time: changes.end_time.unwrap_or(current.end_time),
        };
        list.update(userid, &update).await
    }
}
