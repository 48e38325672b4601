// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request and response of a single version check.

use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::kernel::kernel_version;

/// Flag carrying the kernel release the process runs on.
pub const KERNEL_VERSION_FLAG: &str = "kernel-version";

/// Environment variable that turns every check into a no-op when set.
pub const CHECKPOINT_DISABLE_ENV: &str = "CHECKPOINT_DISABLE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("version checks are disabled by CHECKPOINT_DISABLE")]
    Disabled,

    #[error("invalid check endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("version check request failed: {0}")]
    Transport(String),

    #[error("version check returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed version check response: {0}")]
    Decode(String),
}

/// What is sent to the version-check service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckParams {
    pub product: String,
    pub version: String,
    pub arch: String,
    pub os: String,
    pub signature: String,
    pub flags: BTreeMap<String, String>,
}

impl CheckParams {
    /// Builds params for the running host: the default flags (kernel version)
    /// are merged with `extra_flags`, the caller winning on collisions.
    pub fn new<I, K, V>(product: &str, version: &str, extra_flags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_flags(product, version, merge_flags(default_flags(), extra_flags))
    }

    /// Builds params with exactly the given flags.
    pub fn with_flags(product: &str, version: &str, flags: BTreeMap<String, String>) -> Self {
        Self {
            product: product.to_string(),
            version: version.to_string(),
            arch: env::consts::ARCH.to_string(),
            os: env::consts::OS.to_string(),
            signature: String::new(),
            flags,
        }
    }
}

/// Flags describing the host, sent with every check.
pub fn default_flags() -> BTreeMap<String, String> {
    BTreeMap::from([(KERNEL_VERSION_FLAG.to_string(), kernel_version())])
}

/// Overlays `extra` on top of `defaults`. Keys present in both take the
/// value from `extra`; every other key is kept.
pub fn merge_flags<I, K, V>(defaults: BTreeMap<String, String>, extra: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut flags = defaults;
    flags.extend(extra.into_iter().map(|(k, v)| (k.into(), v.into())));
    flags
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckAlert {
    pub id: i64,
    pub date: i64,
    pub message: String,
    pub url: String,
    pub level: String,
}

/// Answer of the version-check service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckResponse {
    pub product: String,
    pub current_version: String,
    pub current_release: i64,
    pub current_download_url: String,
    pub current_changelog_url: String,
    pub project_website: String,
    pub outdated: bool,
    pub alerts: Vec<CheckAlert>,
}

/// A remote endpoint able to tell whether a product version is current.
#[async_trait]
pub trait VersionCheck: Send + Sync {
    async fn check(&self, params: &CheckParams) -> Result<CheckResponse, CheckError>;
}

#[async_trait]
impl<T: VersionCheck + ?Sized> VersionCheck for Arc<T> {
    async fn check(&self, params: &CheckParams) -> Result<CheckResponse, CheckError> {
        (**self).check(params).await
    }
}

/// Whether checks were switched off through [`CHECKPOINT_DISABLE_ENV`].
pub fn is_check_disabled() -> bool {
    is_check_disabled_from_env(env::var(CHECKPOINT_DISABLE_ENV).ok().as_deref())
}

fn is_check_disabled_from_env(val: Option<&str>) -> bool {
    val.is_some_and(|val| !val.is_empty())
}
