//! Single HTTP exchange behind a trait, with failure classification.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt::{self, Debug};

use crate::error::WeatherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Head => "HEAD",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub field: String,
    pub value: String,
}

impl Header {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

/// Performs one request attempt and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn perform_request(
        &self,
        url: &Url,
        method: HttpMethod,
        body: Option<Vec<u8>>,
        headers: &[Header],
    ) -> Result<Vec<u8>, WeatherError>;
}

/// [`Transport`] over a shared `reqwest` client.
///
/// No request timeout is configured: a hung server hangs the caller.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform_request(
        &self,
        url: &Url,
        method: HttpMethod,
        body: Option<Vec<u8>>,
        headers: &[Header],
    ) -> Result<Vec<u8>, WeatherError> {
        let mut request = self.http.request(method.into(), url.clone());

        for header in headers {
            request = request.header(header.field.as_str(), header.value.as_str());
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        tracing::debug!("{method} {}", redact(url));

        let res = request.send().await.map_err(classify)?;

        let status = res.status();
        let bytes = res.bytes().await.map_err(|err| {
            tracing::debug!("Failed to read response body: {err}");
            WeatherError::InvalidResponse
        })?;

        if !status.is_success() {
            tracing::warn!(
                "{method} {} failed with status {}: {}",
                redact(url),
                status,
                truncate_body(&String::from_utf8_lossy(&bytes)),
            );
            return Err(WeatherError::ServerError {
                status: status.as_u16(),
                body: (!bytes.is_empty()).then(|| bytes.to_vec()),
            });
        }

        Ok(bytes.to_vec())
    }
}

fn classify(err: reqwest::Error) -> WeatherError {
    if err.is_builder() {
        WeatherError::InvalidUrl(err.to_string())
    } else if err.is_connect() {
        WeatherError::NoConnectivity
    } else {
        WeatherError::Unclassified(Box::new(err))
    }
}

/// Strip the query string so credentials never reach the logs.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn success_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "10.0"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/weather?lat=10.0", server.uri())).unwrap();
        let transport = HttpTransport::new();

        let body = transport
            .perform_request(&url, HttpMethod::Get, None, &[Header::new("Accept", "application/json")])
            .await
            .unwrap();

        assert_eq!(body, br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/weather", server.uri())).unwrap();
        let err = HttpTransport::new()
            .perform_request(&url, HttpMethod::Get, None, &[])
            .await
            .unwrap_err();

        match err {
            WeatherError::ServerError { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body.as_deref(), Some(&b"Invalid API key"[..]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/echo", server.uri())).unwrap();
        let body = HttpTransport::new()
            .perform_request(&url, HttpMethod::Post, Some(b"payload".to_vec()), &[])
            .await
            .unwrap();

        assert_eq!(body, b"created");
    }

    #[tokio::test]
    async fn refused_connection_is_no_connectivity() {
        // Bind and drop a listener to get a local port with nothing behind it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let url = Url::parse(&format!("http://127.0.0.1:{port}/weather")).unwrap();
        let err = HttpTransport::new()
            .perform_request(&url, HttpMethod::Get, None, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NoConnectivity), "got {err:?}");
    }

    #[test]
    fn redact_drops_query() {
        let url = Url::parse("https://api.example.com/weather?appid=SECRET&lat=1").unwrap();
        assert_eq!(redact(&url), "https://api.example.com/weather");
    }

    #[test]
    fn truncate_body_limits_length() {
        let long = "x".repeat(250);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
