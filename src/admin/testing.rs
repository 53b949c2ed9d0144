// Test doubles shared by the admin module tests

use crate::admin::request::{NoticeLevel, Notifier};
use crate::admin::transport::{Method, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// Serialize a backend envelope
pub fn envelope(code: i64, message: &str, data: Value) -> String {
    let mut body = serde_json::json!({ "code": code, "message": message });
    if !data.is_null() {
        body["data"] = data;
    }
    body.to_string()
}

/// Collects every notification for later assertions
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_level(NoticeLevel::Error)
    }

    pub fn of_level(&self, level: NoticeLevel) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub form: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

type Responder = Box<dyn Fn(&RecordedCall) -> Result<String, TransportError> + Send + Sync>;
type Delay = Box<dyn Fn(&RecordedCall) -> Option<Duration> + Send + Sync>;

/// In-memory transport answering from a closure and recording every call
pub struct ScriptedTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responder: Responder,
    delay: Option<Delay>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&RecordedCall) -> Result<String, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: None,
        }
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&RecordedCall) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<String, TransportError> {
        let call = RecordedCall {
            method,
            path: path.to_string(),
            form: form.to_vec(),
        };
        self.calls.lock().unwrap().push(call.clone());

        if let Some(wait) = self.delay.as_ref().and_then(|delay| delay(&call)) {
            tokio::time::sleep(wait).await;
        }

        (self.responder)(&call)
    }
}
