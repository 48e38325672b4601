// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Remote server capability set and the instrumentation wrapped around it.
//!
//! [`api::Server`] is the set of calls a daemon exposes to its remote
//! consumers (HTTP handlers, RPC adapters, test harnesses). Any implementation
//! can be wrapped in a [`logging::ErrorLoggingServer`], which forwards every
//! call untouched and emits one structured `tracing` event for each call that
//! fails.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod api;
pub mod error;
pub mod logging;

pub use api::Server;
pub use error::{Result, ServerError};
pub use logging::ErrorLoggingServer;
