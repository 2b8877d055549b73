//! Control endpoint client.
//!
//! [`ControlPlane`] is the seam between the invocation loop and the wire;
//! [`RuntimeClient`] is the blocking HTTP implementation. The fetch is a
//! long poll, so only connection establishment is bounded by a timeout.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::invocation::Invocation;
use crate::reporter::ErrorPayload;

/// The four operations of the control endpoint.
pub trait ControlPlane {
    /// Block until the next invocation is available.
    fn next_invocation(&self) -> Result<Invocation, RuntimeError>;

    fn post_response(&self, request_id: &str, body: Vec<u8>) -> Result<(), RuntimeError>;

    fn post_invocation_error(&self, request_id: &str, error: &ErrorPayload) -> Result<(), RuntimeError>;

    fn post_init_error(&self, error: &ErrorPayload) -> Result<(), RuntimeError>;
}

#[derive(Debug, Clone)]
pub struct RuntimeClient {
    client: Client,
    base: Url,
}

impl RuntimeClient {
    /// `base_url` ends with `/runtime/`, e.g. `http://127.0.0.1:9001/2018-06-01/runtime/`.
    pub fn new(base_url: String, connect_timeout: Duration) -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .user_agent(concat!("custom-runtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RuntimeError::Transport(format!("failed to build HTTP client: {e}")))?;
        let base_url = if base_url.ends_with('/') { base_url } else { format!("{base_url}/") };
        let base = Url::parse(&base_url)
            .map_err(|e| RuntimeError::Config(format!("invalid control endpoint '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(RuntimeError::Config(format!("control endpoint '{base_url}' cannot carry a path")));
        }
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn post_json(&self, segments: &[&str], body: Vec<u8>) -> Result<(), RuntimeError> {
        let url = self.endpoint(segments);
        trace!(%url, bytes = body.len(), "posting");
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| RuntimeError::Transport(format!("POST {url} failed: {e}")))?;
        check_status(response, &url).map(|_| ())
    }
}

fn check_status(response: Response, url: &Url) -> Result<Response, RuntimeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(RuntimeError::Transport(format!("{url} returned {status}: {body}")))
}

impl ControlPlane for RuntimeClient {
    fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let url = self.endpoint(&["invocation", "next"]);
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| RuntimeError::Transport(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::Protocol(format!("{url} returned {status}")));
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .map_err(|e| RuntimeError::Transport(format!("reading invocation body failed: {e}")))?;
        let invocation = Invocation::from_headers(&headers, body.to_vec())?;
        debug!(
            request_id = %invocation.request_id,
            content_type = %invocation.content_type,
            bytes = invocation.body.len(),
            "invocation received"
        );
        Ok(invocation)
    }

    fn post_response(&self, request_id: &str, body: Vec<u8>) -> Result<(), RuntimeError> {
        self.post_json(&["invocation", request_id, "response"], body)
    }

    fn post_invocation_error(&self, request_id: &str, error: &ErrorPayload) -> Result<(), RuntimeError> {
        self.post_json(&["invocation", request_id, "error"], error.to_json()?)
    }

    fn post_init_error(&self, error: &ErrorPayload) -> Result<(), RuntimeError> {
        self.post_json(&["init", "error"], error.to_json()?)
    }
}
