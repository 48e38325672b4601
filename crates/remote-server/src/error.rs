// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors a [`crate::api::Server`] implementation can return to its callers.
///
/// The variants classify the failure for the transport layer; wrappers such as
/// [`crate::logging::ErrorLoggingServer`] never inspect or rewrite them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    Missing(String),

    #[error("{message}")]
    User { message: String, help: String },

    #[error("server unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Error caused by a bad request, with a hint the user can act on.
    pub fn user(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Help text for user errors, if any.
    pub fn help(&self) -> Option<&str> {
        match self {
            Self::User { help, .. } => Some(help),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
