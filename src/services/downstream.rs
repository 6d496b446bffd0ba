//! Shared plumbing for talking to downstream services: URL building,
//! response classification and transparent request forwarding.

use std::time::Duration;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use url::Url;

use crate::config::DownstreamConfig;

/// Downstream statuses relayed to the caller as-is instead of becoming a 500
pub const PASSTHROUGH_STATUSES: [StatusCode; 4] = [
    StatusCode::NOT_MODIFIED,
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::UNPROCESSABLE_ENTITY,
];

/// Status and body received from a downstream service, relayed verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl DownstreamResponse {
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from(body.to_string()),
        }
    }
}

impl IntoResponse for DownstreamResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        match self.content_type {
            Some(content_type) => {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

#[derive(Debug, Error)]
pub enum DownstreamError {
    /// Recognized rejection; the caller gets the original status and body
    #[error("downstream rejected the request with status {}", .0.status)]
    Rejected(DownstreamResponse),

    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid downstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Build the HTTP client shared by every downstream call
pub fn build_http_client(config: &DownstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
}

/// Append path segments to a root URL, percent-encoding each segment.
/// A trailing slash on the root does not produce an empty segment.
pub fn join_segments(root: &Url, segments: &[&str]) -> Result<Url, url::ParseError> {
    let mut url = root.clone();
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a prepared request and classify the outcome
pub async fn execute(
    request: reqwest::RequestBuilder,
    url: &Url,
) -> Result<DownstreamResponse, DownstreamError> {
    let transport = |source| DownstreamError::Transport {
        url: url.to_string(),
        source,
    };

    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let body = response.bytes().await.map_err(transport)?;

    let relayed = DownstreamResponse {
        status,
        content_type,
        body,
    };

    if status.is_success() {
        Ok(relayed)
    } else if PASSTHROUGH_STATUSES.contains(&status) {
        Err(DownstreamError::Rejected(relayed))
    } else {
        Err(DownstreamError::UnexpectedStatus {
            url: url.to_string(),
            status,
            body: String::from_utf8_lossy(&relayed.body).into_owned(),
        })
    }
}

/// Request to relay unchanged to a downstream service
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.url.set_query(query.filter(|q| !q.is_empty()));
        self
    }

    /// Copy only the content negotiation headers of the inbound request
    pub fn with_inbound_headers(mut self, inbound: &HeaderMap) -> Self {
        for name in [header::CONTENT_TYPE, header::ACCEPT] {
            if let Some(value) = inbound.get(&name) {
                self.headers.insert(name, value.clone());
            }
        }
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// Transparent passthrough to downstream services
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn forward(&self, request: ForwardRequest) -> Result<DownstreamResponse, DownstreamError> {
        tracing::debug!(method = %request.method, url = %request.url, "forwarding request");

        let mut builder = self
            .client
            .request(request.method, request.url.clone())
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        execute(builder, &request.url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn joins_segments_regardless_of_trailing_slash() {
        let root = Url::parse("http://vanpi-api:5000/").unwrap();
        let url = join_segments(&root, &["relays", "state"]).unwrap();
        assert_eq!(url.as_str(), "http://vanpi-api:5000/relays/state");

        let root = Url::parse("http://vanpi-api:5000/api").unwrap();
        let url = join_segments(&root, &["modes", "night light"]).unwrap();
        assert_eq!(url.as_str(), "http://vanpi-api:5000/api/modes/night%20light");
    }

    #[tokio::test]
    async fn forwards_method_query_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/settings/gpsd_usb_device"))
            .and(query_param("force", "1"))
            .and(header_is("content-type", "application/json"))
            .and(body_string(r#"{"value":"/dev/ttyUSB0"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let mut inbound = HeaderMap::new();
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert(header::COOKIE, HeaderValue::from_static("connect.sid=abc"));

        let root = Url::parse(&server.uri()).unwrap();
        let request = ForwardRequest::new(
            Method::PUT,
            join_segments(&root, &["settings", "gpsd_usb_device"]).unwrap(),
        )
        .with_query(Some("force=1"))
        .with_inbound_headers(&inbound)
        .with_body(Bytes::from_static(br#"{"value":"/dev/ttyUSB0"}"#));

        assert!(request.headers.get(header::COOKIE).is_none());

        let response = Forwarder::new(reqwest::Client::new())
            .forward(request)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&response.body).unwrap(),
            json!({ "ok": true })
        );
    }

    #[tokio::test]
    async fn classifies_downstream_statuses() {
        let server = MockServer::start().await;
        Mock::given(path("/rejected"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "error": "bad relay" })))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let root = Url::parse(&server.uri()).unwrap();
        let forwarder = Forwarder::new(reqwest::Client::new());

        let rejected = forwarder
            .forward(ForwardRequest::new(Method::GET, join_segments(&root, &["rejected"]).unwrap()))
            .await;
        match rejected {
            Err(DownstreamError::Rejected(response)) => {
                assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(
                    serde_json::from_slice::<serde_json::Value>(&response.body).unwrap(),
                    json!({ "error": "bad relay" })
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let broken = forwarder
            .forward(ForwardRequest::new(Method::GET, join_segments(&root, &["broken"]).unwrap()))
            .await;
        assert!(matches!(
            broken,
            Err(DownstreamError::UnexpectedStatus { status, .. }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_failure() {
        let port = portpicker::pick_unused_port().unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/relays/state", port)).unwrap();

        let result = Forwarder::new(reqwest::Client::new())
            .forward(ForwardRequest::new(Method::GET, url))
            .await;
        assert!(matches!(result, Err(DownstreamError::Transport { .. })));
    }

    #[tokio::test]
    async fn relayed_response_keeps_status_and_content_type() {
        let relayed = DownstreamResponse {
            status: StatusCode::UNAUTHORIZED,
            content_type: Some(HeaderValue::from_static("text/plain")),
            body: Bytes::from_static(b"nope"),
        };
        let response = relayed.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"nope");
    }
}
