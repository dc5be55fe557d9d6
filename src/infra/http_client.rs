//! HTTP client factory with consistent timeout configuration.

use std::time::Duration;

use reqwest::Client;

/// TCP handshake + TLS.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request/response time. Email delivery is retried once by the
/// dispatcher, so a slow provider costs at most two of these.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub fn try_build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
}
