use crate::admin::config::endpoints;
use crate::admin::request::Requester;
use crate::admin::types::{AppDetail, AppSummary, Credential, CredentialDetail, NormalizedResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// Session
// ============================================================================

#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ============================================================================
// Apps
// ============================================================================

#[derive(Serialize, Debug, Clone)]
pub struct AddAppRequest {
    pub name: String,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct AppIdRequest {
    pub appid: u64,
}

/// Update of the editable app fields
#[derive(Serialize, Debug, Clone)]
pub struct SetAppRequest {
    pub id: u64,
    pub description: String,
    pub notice: String,
    pub status: String,
}

/// JSON config blob; sent as JSON text inside the form body
#[derive(Serialize, Debug, Clone)]
pub struct SetAppConfigRequest {
    pub appid: u64,
    pub config: Value,
}

// ============================================================================
// Users (credentials)
// ============================================================================

/// Creates one credential
#[derive(Serialize, Debug, Clone)]
pub struct AddUserRequest {
    pub appid: u64,
    pub usertype: String,
    pub userkey: String,
    /// Granted time in seconds
    pub time_interval: u64,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct DeleteUserRequest {
    pub appid: u64,
    pub userid: u64,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct UserIdRequest {
    pub userid: u64,
}

/// Edit of status, description and expiry (epoch seconds, 0 = none)
#[derive(Serialize, Debug, Clone)]
pub struct SetUserRequest {
    pub id: u64,
    pub status: String,
    pub description: String,
    pub end_time: i64,
}

// ============================================================================
// Client
// ============================================================================

/// Typed wrappers around every admin endpoint
#[derive(Clone)]
pub struct AdminApi {
    requester: Arc<Requester>,
}

impl AdminApi {
    pub fn new(requester: Arc<Requester>) -> Self {
        Self { requester }
    }

    pub fn requester(&self) -> &Arc<Requester> {
        &self.requester
    }

    pub async fn login(&self, request: &LoginRequest) -> NormalizedResult<Value> {
        self.requester.post_form(endpoints::ADMIN_LOGIN, request).await
    }

    pub async fn logout(&self) -> NormalizedResult<Value> {
        self.requester.post(endpoints::ADMIN_LOGOUT).await
    }

    pub async fn list_apps(&self) -> NormalizedResult<Vec<AppSummary>> {
        self.requester.post(endpoints::APP_LIST).await
    }

    pub async fn add_app(&self, name: &str) -> NormalizedResult<Value> {
        let request = AddAppRequest {
            name: name.to_string(),
        };
        self.requester.post_form(endpoints::APP_ADD, &request).await
    }

    pub async fn app_info(&self, appid: u64) -> NormalizedResult<AppDetail> {
        self.requester
            .post_form(endpoints::APP_INFO, &AppIdRequest { appid })
            .await
    }

    pub async fn set_app(&self, request: &SetAppRequest) -> NormalizedResult<Value> {
        self.requester.post_form(endpoints::APP_SET, request).await
    }

    /// Ask the backend to generate a fresh RSA key pair for the app
    pub async fn regenerate_app_keys(&self, appid: u64) -> NormalizedResult<Value> {
        self.requester
            .post_form(endpoints::APP_SET_KEYS, &AppIdRequest { appid })
            .await
    }

    pub async fn set_app_config(&self, appid: u64, config: Value) -> NormalizedResult<Value> {
        self.requester
            .post_form(endpoints::APP_SET_CONFIG, &SetAppConfigRequest { appid, config })
            .await
    }

    pub async fn delete_app(&self, appid: u64) -> NormalizedResult<Value> {
        self.requester
            .post_form(endpoints::APP_DELETE, &AppIdRequest { appid })
            .await
    }

    pub async fn list_users(&self, appid: u64) -> NormalizedResult<Vec<Credential>> {
        self.requester
            .post_form(endpoints::USER_LIST, &AppIdRequest { appid })
            .await
    }

    pub async fn add_user(&self, request: &AddUserRequest) -> NormalizedResult<Value> {
        self.requester.post_form(endpoints::USER_ADD, request).await
    }

    pub async fn delete_user(&self, appid: u64, userid: u64) -> NormalizedResult<Value> {
        self.requester
            .post_form(endpoints::USER_DELETE, &DeleteUserRequest { appid, userid })
            .await
    }

    pub async fn user_info(&self, userid: u64) -> NormalizedResult<CredentialDetail> {
        self.requester
            .post_form(endpoints::USER_INFO, &UserIdRequest { userid })
            .await
    }

    pub async fn set_user(&self, request: &SetUserRequest) -> NormalizedResult<Value> {
        self.requester.post_form(endpoints::USER_SET, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::testing::{envelope, RecordingNotifier, ScriptedTransport};
    use crate::admin::transport::Method;
    use crate::admin::types::CredentialStatus;
    use serde_json::json;

    fn api(transport: ScriptedTransport) -> (AdminApi, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let requester = Requester::new(transport.clone(), Arc::new(RecordingNotifier::default()));
        (AdminApi::new(Arc::new(requester)), transport)
    }

    #[tokio::test]
    async fn test_list_apps_decodes_summaries() {
        let (api, transport) = api(ScriptedTransport::new(|_| {
            Ok(envelope(
                200,
                "ok",
                json!([
                    {"ID": "1", "Name": "Editor", "Description": "desktop", "Status": "Active"},
                    {"ID": 2, "Name": "Viewer"}
                ]),
            ))
        }));

        let apps = api.list_apps().await.ok().unwrap();

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].id, 1);
        assert_eq!(apps[1].name, "Viewer");
        assert_eq!(transport.calls()[0].path, endpoints::APP_LIST);
        assert_eq!(transport.calls()[0].method, Method::Post);
    }

    #[tokio::test]
    async fn test_list_users_sends_appid() {
        let (api, transport) = api(ScriptedTransport::new(|_| {
            Ok(envelope(
                200,
                "ok",
                json!([{"ID": 5, "Usertype": "Serial", "Serial": "SN-5", "Status": "Active"}]),
            ))
        }));

        let users = api.list_users(9).await.ok().unwrap();

        assert_eq!(users[0].key, "SN-5");
        assert_eq!(users[0].status, CredentialStatus::Active);
        assert_eq!(transport.calls()[0].field("appid"), Some("9"));
    }

    #[tokio::test]
    async fn test_mutation_payloads() {
        let (api, transport) =
            api(ScriptedTransport::new(|_| Ok(envelope(200, "ok", Value::Null))));

        api.delete_user(3, 44).await;
        api.set_user(&SetUserRequest {
            id: 44,
            status: CredentialStatus::Frozen.as_wire().to_string(),
            description: "refund".to_string(),
            end_time: 0,
        })
        .await;
        api.set_app_config(3, json!({"notice": true})).await;

        let delete = &transport.calls_to(endpoints::USER_DELETE)[0];
        assert_eq!(delete.field("appid"), Some("3"));
        assert_eq!(delete.field("userid"), Some("44"));

        let set = &transport.calls_to(endpoints::USER_SET)[0];
        assert_eq!(set.field("status"), Some("Freeze"));
        assert_eq!(set.field("end_time"), Some("0"));

        let config = &transport.calls_to(endpoints::APP_SET_CONFIG)[0];
        assert_eq!(config.field("config"), Some(r#"{"notice":true}"#));
    }
}
