// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared HTTP plumbing for the REST adapters.

use std::time::Duration;

use crate::domain::integration::IntegrationError;

const USER_AGENT: &str = concat!("the-weave/", env!("CARGO_PKG_VERSION"));

/// Client used by every REST adapter. The bridge enforces its own per-call
/// timeout; this one only bounds connection setup.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turn a non-2xx response into `IntegrationError::Api`.
pub async fn check(service: &str, response: reqwest::Response) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Api {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}

pub fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}
