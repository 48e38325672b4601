// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use checkpoint::{
    check::CheckParams, check_interval, config::CheckerConfig, log_check_result, HttpCheckClient,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const FALLBACK_LOG_LEVEL: &str = "info";

#[tokio::main]
pub async fn main() {
    let config = CheckerConfig::from_env();

    let log_level = config
        .as_ref()
        .map(|c| c.log_level.as_str())
        .unwrap_or(FALLBACK_LOG_LEVEL);
    let env_filter = format!("h2=off,hyper=off,hyper_util=off,reqwest=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Error reading configuration, update agent will not start: {e}");
            return;
        }
    };

    let client = match HttpCheckClient::new(
        &config.endpoint,
        config.https_proxy.as_deref(),
        config.timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Error creating version check client: {e}");
            return;
        }
    };

    let params = CheckParams::new(&config.product, AGENT_VERSION, config.flags.clone());
    let mut checker = match check_interval(client, params, config.interval, log_check_result) {
        Ok(checker) => checker,
        Err(e) => {
            error!("Error starting version checker: {e}");
            return;
        }
    };
    info!(
        "Checking {} {} for updates every {:?}",
        config.product, AGENT_VERSION, config.interval
    );

    wait_for_shutdown().await;

    info!("Shutting down update agent");
    checker.stop().await;
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => error!("Unable to listen for SIGTERM: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }
}
