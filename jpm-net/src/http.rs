use std::time::Duration;

use jpm_common::error::{JpmError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};

const TRANSFER_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "jpm module manager (Rust; +https://github.com/jpm-rs/jpm)";

/// Builds the blocking client every registry/transport call goes through.
/// Clients are created per call and dropped on all exit paths; nothing
/// network-facing outlives the operation that opened it.
pub(crate) fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, USER_AGENT_STRING.parse().unwrap());
    headers.insert(ACCEPT, "*/*".parse().unwrap());
    Client::builder()
        .timeout(Duration::from_secs(TRANSFER_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| JpmError::Config(format!("Failed to build HTTP client: {e}")))
}

pub(crate) fn with_auth(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}
