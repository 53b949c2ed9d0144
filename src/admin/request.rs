//! Request/response normalization.
//!
//! Every backend call goes through [`Requester::call`], which always resolves
//! to a [`NormalizedResult`]: transport failures, HTTP failures and business
//! failures (`code != 200`) all come back as `success == false` after exactly
//! one error notification. Callers branch on `success` instead of handling
//! errors themselves.

use crate::admin::config::messages::{NETWORK_ERROR, OPERATION_SUCCEEDED, SYSTEM_EXCEPTION};
use crate::admin::config::{FALLBACK_ERROR_CODE, SUCCESS_CODE};
use crate::admin::transport::{Method, Transport, TransportError};
use crate::admin::types::{BackendEnvelope, ConsoleError, NormalizedResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Non-blocking user notifications (the console's "toasts")
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }

    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    fn info(&self, message: &str) {
        self.notify(NoticeLevel::Info, message);
    }
}

/// Prints notifications to stderr so stdout stays machine-readable
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => eprintln!("[ok] {}", message),
            NoticeLevel::Info => eprintln!("[info] {}", message),
            NoticeLevel::Error => eprintln!("[error] {}", message),
        }
    }
}

// ============================================================================
// Loading state
// ============================================================================

/// In-flight request counter; "loading" while any request is outstanding.
///
/// Library callers poll [`LoadingState::is_loading`] through
/// [`Requester::loading`]; idle/busy transitions are also traced at debug level.
#[derive(Debug, Clone, Default)]
pub struct LoadingState {
    in_flight: Arc<AtomicUsize>,
}

impl LoadingState {
    pub fn begin(&self) -> LoadingGuard {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::debug!("requests in flight");
        }
        LoadingGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }
}

/// Decrements the counter when the request settles
#[derive(Debug)]
pub struct LoadingGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!("all requests settled");
        }
    }
}

// ============================================================================
// Payload encoding
// ============================================================================

/// Flatten a serializable payload into form pairs.
///
/// Top-level fields become keys; strings go as-is, numbers and booleans as
/// their text, nested arrays/objects as JSON text. Null fields are skipped.
pub fn form_pairs<P>(payload: &P) -> Result<Vec<(String, String)>, ConsoleError>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(payload)
        .map_err(|e| ConsoleError::Validation(format!("Failed to encode request: {}", e)))?;

    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(fields) => Ok(fields
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    nested => nested.to_string(),
                };
                Some((key, text))
            })
            .collect()),
        other => Err(ConsoleError::Validation(format!(
            "Request payload must be an object, got {}",
            other
        ))),
    }
}

// ============================================================================
// Requester
// ============================================================================

/// The normalizer every API call is routed through
pub struct Requester {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    loading: LoadingState,
}

impl Requester {
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            notifier,
            loading: LoadingState::default(),
        }
    }

    pub fn loading(&self) -> &LoadingState {
        &self.loading
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Same as [`Requester::call`] with a method name such as `"POST"`
    pub async fn request<T, P>(
        &self,
        method: &str,
        path: &str,
        payload: Option<&P>,
    ) -> NormalizedResult<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.call(Method::parse(method), path, payload).await
    }

    /// POST without a body
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> NormalizedResult<T> {
        self.call::<T, serde_json::Value>(Method::Post, path, None).await
    }

    /// POST with a form body
    pub async fn post_form<T, P>(&self, path: &str, payload: &P) -> NormalizedResult<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.call(Method::Post, path, Some(payload)).await
    }

    pub async fn call<T, P>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&P>,
    ) -> NormalizedResult<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let form = match payload.map(form_pairs).transpose() {
            Ok(form) => form.unwrap_or_default(),
            Err(e) => return self.fail(FALLBACK_ERROR_CODE, e.to_string()),
        };

        tracing::debug!(method = method.as_str(), path, fields = form.len(), "dispatching request");

        let outcome = {
            let _loading = self.loading.begin();
            self.transport.send(method, path, &form).await
        };

        match outcome {
            Ok(body) => self.normalize_reply(path, &body),
            Err(error) => self.normalize_failure(path, error),
        }
    }

    fn normalize_reply<T: DeserializeOwned>(&self, path: &str, body: &str) -> NormalizedResult<T> {
        let envelope: BackendEnvelope<serde_json::Value> = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                return self.normalize_failure(
                    path,
                    TransportError::Other(format!("Invalid response body: {}", e)),
                )
            }
        };

        let code = envelope.code;
        let data = envelope.data.filter(|value| !value.is_null());

        if code != SUCCESS_CODE {
            let message = if envelope.message.is_empty() {
                format!("Request failed (code {})", code)
            } else {
                envelope.message
            };
            tracing::warn!(path, code, message = %message, "backend rejected request");
            self.notifier.error(&message);
            let result = data.and_then(|value| serde_json::from_value(value).ok());
            return NormalizedResult::new(code, message, result);
        }

        let message = if envelope.message.is_empty() {
            OPERATION_SUCCEEDED.to_string()
        } else {
            envelope.message
        };

        match data.map(serde_json::from_value::<T>).transpose() {
            Ok(result) => NormalizedResult::new(code, message, result),
            Err(e) => {
                tracing::warn!(path, error = %e, "response data did not match the expected shape");
                self.fail(FALLBACK_ERROR_CODE, format!("{}: {}", SYSTEM_EXCEPTION, e))
            }
        }
    }

    fn normalize_failure<T>(&self, path: &str, error: TransportError) -> NormalizedResult<T> {
        let (code, message) = match &error {
            TransportError::Network(_) => (FALLBACK_ERROR_CODE, NETWORK_ERROR.to_string()),
            TransportError::Status { status, message } => (
                i64::from(*status),
                message.clone().unwrap_or_else(|| error.to_string()),
            ),
            TransportError::Other(raw) if raw.is_empty() => {
                (FALLBACK_ERROR_CODE, SYSTEM_EXCEPTION.to_string())
            }
            TransportError::Other(raw) => (FALLBACK_ERROR_CODE, raw.clone()),
        };

        tracing::warn!(path, code, error = %error, "request failed");
        self.fail(code, message)
    }

    fn fail<T>(&self, code: i64, message: String) -> NormalizedResult<T> {
        self.notifier.error(&message);
        NormalizedResult::failure(code, message)
    }
}
