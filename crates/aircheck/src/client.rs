// Shared HTTP client construction for index and segment requests.

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::proxy::build_proxy_from_config;

pub fn get_default_headers() -> HeaderMap {
    let mut default_headers = HeaderMap::new();

    default_headers.insert(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_static("gzip, deflate"),
    );

    default_headers.insert(
        reqwest::header::CONNECTION,
        HeaderValue::from_static("keep-alive"),
    );

    default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

    default_headers
}

/// One client serves both the index poller and every fetch worker, so
/// segment requests multiplex over the same connection pool.
pub fn build_http_client(config: &RecorderConfig) -> Result<Client, RecorderError> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(get_default_headers())
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(config.connect_timeout);

    if let Some(proxy_config) = &config.proxy {
        builder = builder.proxy(build_proxy_from_config(proxy_config)?);
    }

    builder.build().map_err(RecorderError::from)
}
