// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic version checks.
//!
//! A [`Checker`] asks a remote version-check service, once at start and then
//! on a fixed interval, whether the running version of a product is current,
//! and hands every answer to a callback. [`check_for_updates`] wires the
//! default six-hour period to [`log_check_result`], which reports the answer
//! through `tracing`.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod check;
pub mod checker;
pub mod client;
pub mod config;
pub mod handler;
pub mod kernel;

pub use check::{CheckError, CheckParams, CheckResponse, VersionCheck};
pub use checker::{check_interval, Checker, CheckerError, CheckerState};
pub use client::HttpCheckClient;
pub use handler::{check_for_updates, log_check_result, VERSION_CHECK_PERIOD};
