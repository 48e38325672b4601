// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tracing::{error, info, warn};

use crate::check::{CheckError, CheckParams, CheckResponse, VersionCheck};
use crate::checker::{check_interval, Checker, CheckerError};

/// How often a long-running process asks whether it is outdated.
pub const VERSION_CHECK_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);

/// Reports a check outcome to the operator. Failures are logged, never fatal.
pub fn log_check_result(result: Result<CheckResponse, CheckError>) {
    match result {
        Err(e) => error!(error = %e, "version check failed"),
        Ok(response) if response.outdated => warn!(
            latest = %response.current_version,
            url = %response.current_download_url,
            "update available"
        ),
        Ok(response) => info!(latest = %response.current_version, "up to date"),
    }
}

/// Starts checking every [`VERSION_CHECK_PERIOD`] whether `version` of
/// `product` is current, logging each answer with [`log_check_result`].
///
/// `extra_flags` are sent along with the host flags and override them on
/// key collision.
pub fn check_for_updates<C, I, K, V>(
    client: C,
    product: &str,
    version: &str,
    extra_flags: I,
) -> Result<Checker, CheckerError>
where
    C: VersionCheck + 'static,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let params = CheckParams::new(product, version, extra_flags);
    check_interval(client, params, VERSION_CHECK_PERIOD, log_check_result)
}
