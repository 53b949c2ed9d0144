use crate::admin::config::{endpoints, ConsoleConfig, FORM_CONTENT_TYPE};
use crate::admin::types::ConsoleError;
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::sync::Arc;

/// HTTP method; anything other than `post` is sent as `get`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method.trim().to_ascii_lowercase().as_str() {
            "post" => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
        }
    }
}

/// Ways a request can fail before a backend envelope is available
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// No HTTP response was obtained (connect, DNS, timeout)
    #[error("Network Error: {0}")]
    Network(String),

    /// A response arrived with a non-2xx status
    #[error("Request failed with status code {status}")]
    Status { status: u16, message: Option<String> },

    #[error("{0}")]
    Other(String),
}

/// Sends one form-encoded request and yields the raw body of a 2xx reply
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<String, TransportError>;
}

/// `application/x-www-form-urlencoded` encoding of key/value pairs
pub fn encode_form(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Pull the `Message` field out of an error body, if it is JSON
pub fn error_message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["Message", "message"]
        .iter()
        .find_map(|field| value.get(*field).and_then(|m| m.as_str()))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

// ============================================================================
// HTTP Client
// ============================================================================

/// reqwest-backed transport with a cookie jar for the admin session
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| ConsoleError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            jar,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn parse_url(&self, path: &str) -> Result<reqwest::Url, ConsoleError> {
        self.url(path)
            .parse()
            .map_err(|e| {
                ConsoleError::Config(format!("Invalid API URL '{}': {}", self.base_url, e))
            })
    }

    /// Cookie header the backend set for the admin API, if any
    pub fn cookie_header(&self) -> Option<String> {
        let url = self.parse_url(endpoints::ADMIN_LOGIN).ok()?;
        self.jar
            .cookies(&url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Seed the jar from a previously saved cookie header
    pub fn restore_cookies(&self, header: &str) -> Result<(), ConsoleError> {
        let url = self.parse_url("/")?;
        for cookie in header.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            self.jar.add_cookie_str(cookie, &url);
        }
        Ok(())
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        TransportError::Network(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<String, TransportError> {
        let encoded = encode_form(form);
        let request = match method {
            Method::Post => self.client.post(self.url(path)).body(encoded),
            Method::Get if encoded.is_empty() => self.client.get(self.url(path)),
            Method::Get => self.client.get(format!("{}?{}", self.url(path), encoded)),
        };

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message_from_body(&body),
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn test_config() -> ConsoleConfig {
        ConsoleConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(200),
            session_path: PathBuf::from("/tmp/unused.json"),
            page_size: 10,
        }
    }

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("POST"), Method::Post);
        assert_eq!(Method::parse("Post"), Method::Post);
        assert_eq!(Method::parse("GET"), Method::Get);
        assert_eq!(Method::parse("delete"), Method::Get);
    }

    #[test]
    fn test_encode_form() {
        let encoded = encode_form(&pairs(&[("appid", "3"), ("userkey", "A B&C")]));
        assert_eq!(encoded, "appid=3&userkey=A%20B%26C");
        assert_eq!(encode_form(&[]), "");
    }

    #[test]
    fn test_error_message_from_body() {
        assert_eq!(
            error_message_from_body(r#"{"Message":"not found"}"#),
            Some("not found".to_string())
        );
        assert_eq!(
            error_message_from_body(r#"{"message":"bad gateway"}"#),
            Some("bad gateway".to_string())
        );
        assert_eq!(error_message_from_body("<html>oops</html>"), None);
        assert_eq!(error_message_from_body(r#"{"Message":""}"#), None);
    }

    #[test]
    fn test_cookie_restore_roundtrip() {
        let transport = HttpTransport::new(&test_config()).unwrap();
        assert!(transport.cookie_header().is_none());

        transport.restore_cookies("sid=abc123; theme=dark").unwrap();
        let header = transport.cookie_header().unwrap();
        assert!(header.contains("sid=abc123"));
        assert!(header.contains("theme=dark"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let transport = HttpTransport::new(&test_config()).unwrap();
        let result = transport.send(Method::Post, endpoints::APP_LIST, &[]).await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    /// Request as seen by a one-shot local server
    struct CapturedRequest {
        head: String,
        body: String,
    }

    impl CapturedRequest {
        fn request_line(&self) -> &str {
            self.head.lines().next().unwrap_or_default()
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case(name).then(|| value.trim())
            })
        }
    }

    /// Accept one HTTP request, capture it and answer with `status_line` and `reply`
    async fn serve_once(
        status_line: &'static str,
        reply: &'static str,
    ) -> (ConsoleConfig, tokio::task::JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];

            let head_end = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let length = head
                .lines()
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    if key.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            while buf.len() < head_end + length {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before body");
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[head_end..head_end + length]).to_string();

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                status_line,
                reply.len(),
                reply
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();

            CapturedRequest { head, body }
        });

        let config = ConsoleConfig {
            api_url: format!("http://{}", addr),
            timeout: Duration::from_secs(5),
            ..test_config()
        };
        (config, handle)
    }

    #[tokio::test]
    async fn test_get_payload_goes_in_query_string() {
        let (config, server) = serve_once("HTTP/1.1 200 OK", r#"{"code":200}"#).await;
        let transport = HttpTransport::new(&config).unwrap();
        let form = pairs(&[("appid", "3"), ("keyword", "A B")]);

        let body = transport.send(Method::Get, endpoints::USER_LIST, &form).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(body, r#"{"code":200}"#);
        assert_eq!(
            request.request_line(),
            "GET /api/user/getlist?appid=3&keyword=A%20B HTTP/1.1"
        );
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_post_payload_goes_in_form_body() {
        let (config, server) = serve_once("HTTP/1.1 200 OK", r#"{"code":200}"#).await;
        let transport = HttpTransport::new(&config).unwrap();
        let form = pairs(&[("appid", "3"), ("userkey", "K1&K2")]);

        transport.send(Method::Post, endpoints::USER_ADD, &form).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(request.request_line(), "POST /api/user/add HTTP/1.1");
        assert_eq!(request.header("content-type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(request.body, "appid=3&userkey=K1%26K2");
    }

    #[tokio::test]
    async fn test_error_status_carries_body_message() {
        let (config, server) =
            serve_once("HTTP/1.1 404 Not Found", r#"{"Message":"no such app"}"#).await;
        let transport = HttpTransport::new(&config).unwrap();

        let result = transport.send(Method::Post, endpoints::APP_INFO, &[]).await;
        server.await.unwrap();

        match result {
            Err(TransportError::Status { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message.as_deref(), Some("no such app"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
