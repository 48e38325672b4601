// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the version-check service.
//!
//! A check is a single `GET {endpoint}/v1/check/{product}` whose query string
//! carries the running version, platform and one `flag=key:value` pair per
//! flag. The service answers with a JSON [`CheckResponse`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Url};
use tracing::debug;

use crate::check::{is_check_disabled, CheckError, CheckParams, CheckResponse, VersionCheck};

pub const DEFAULT_ENDPOINT: &str = "https://checkpoint-api.weave.works";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

const USER_AGENT: &str = concat!("checkpoint/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpCheckClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCheckClient {
    /// Client for `endpoint`, optionally going through an HTTPS proxy. Every
    /// request is bounded by `timeout`.
    pub fn new(
        endpoint: &str,
        https_proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, CheckError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| CheckError::InvalidEndpoint(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(CheckError::InvalidEndpoint(endpoint.to_string()));
        }
        let client = build_client(https_proxy, timeout)?;
        Ok(Self { client, endpoint })
    }

    fn check_url(&self, product: &str) -> Result<Url, CheckError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| CheckError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(["v1", "check", product]);
        Ok(url)
    }
}

fn build_client(https_proxy: Option<&str>, timeout: Duration) -> Result<reqwest::Client, CheckError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT);
    if let Some(proxy) = https_proxy {
        let proxy = reqwest::Proxy::https(proxy).map_err(|e| CheckError::Client(e.to_string()))?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| CheckError::Client(e.to_string()))
}

fn query_pairs(params: &CheckParams) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("version", params.version.clone()),
        ("arch", params.arch.clone()),
        ("os", params.os.clone()),
        ("signature", params.signature.clone()),
    ];
    pairs.extend(
        params
            .flags
            .iter()
            .map(|(key, value)| ("flag", format!("{key}:{value}"))),
    );
    pairs
}

#[async_trait]
impl VersionCheck for HttpCheckClient {
    async fn check(&self, params: &CheckParams) -> Result<CheckResponse, CheckError> {
        if is_check_disabled() {
            return Err(CheckError::Disabled);
        }

        let url = self.check_url(&params.product)?;
        debug!("Checking {} {} against {}", params.product, params.version, url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .query(&query_pairs(params))
            .send()
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| CheckError::Decode(e.to_string()))
    }
}
