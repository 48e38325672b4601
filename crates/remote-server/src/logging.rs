// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error-logging proxy for [`Server`] implementations.
//!
//! [`ErrorLoggingServer`] implements [`Server`] by delegating every call to the
//! wrapped implementation and returning its result untouched. When a call
//! returns an error, a single `ERROR` event is emitted carrying the method
//! name, the error and, for some methods, the scalar arguments that identify
//! what was asked for. Results are never logged: an `Export` payload can be
//! large and may contain secrets.

use std::panic::{resume_unwind, AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, Span};

use crate::api::{
    Change, ControllerStatus, GitConfig, ImageStatus, JobId, JobStatus, ListImagesOptions,
    ListServicesOptions, ResourceSpec, Server, UpdateSpec,
};
use crate::error::Result;

const FAILURE_MESSAGE: &str = "remote call failed";

/// Awaits `$call` and logs its failure exactly once, whichever way it exits.
///
/// A panic inside the wrapped call is reported with `error = "panicked"` and
/// then resumed so the caller observes it as if unwrapped.
macro_rules! observe {
    ($span:expr, $method:literal, $call:expr $(; $($field:tt)+)?) => {{
        match AssertUnwindSafe($call).catch_unwind().await {
            Ok(result) => {
                if let Err(err) = &result {
                    $span.in_scope(|| {
                        error!(method = $method, error = %err, $($($field)+,)? "{}", FAILURE_MESSAGE)
                    });
                }
                result
            }
            Err(panic) => {
                $span.in_scope(|| {
                    error!(method = $method, error = "panicked", $($($field)+,)? "{}", FAILURE_MESSAGE)
                });
                resume_unwind(panic)
            }
        }
    }};
}

/// Wraps a [`Server`] and logs every failed call.
///
/// The wrapper holds no mutable state, so it can be shared between any number
/// of concurrent callers (typically behind an `Arc`).
pub struct ErrorLoggingServer<S> {
    server: S,
    span: Span,
}

impl<S> ErrorLoggingServer<S> {
    /// Wraps `server`, attaching failure events to the span current at
    /// construction time.
    pub fn new(server: S) -> Self {
        Self::with_span(server, Span::current())
    }

    /// Wraps `server`, emitting failure events inside `span` so its fields
    /// (component, peer, ...) decorate every event.
    pub fn with_span(server: S, span: Span) -> Self {
        Self { server, span }
    }

    pub fn inner(&self) -> &S {
        &self.server
    }

    pub fn into_inner(self) -> S {
        self.server
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for ErrorLoggingServer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLoggingServer")
            .field("server", &self.server)
            .finish()
    }
}

#[async_trait]
impl<S: Server> Server for ErrorLoggingServer<S> {
    async fn export(&self) -> Result<Vec<u8>> {
        // The exported config stays out of the event, only the failure is reported
        observe!(self.span, "Export", self.server.export())
    }

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<ControllerStatus>> {
        observe!(
            self.span,
            "ListServices",
            self.server.list_services(namespace);
            namespace = ?namespace
        )
    }

    async fn list_services_with_options(
        &self,
        opts: ListServicesOptions,
    ) -> Result<Vec<ControllerStatus>> {
        observe!(
            self.span,
            "ListServicesWithOptions",
            self.server.list_services_with_options(opts)
        )
    }

    async fn list_images(&self, spec: ResourceSpec) -> Result<Vec<ImageStatus>> {
        observe!(self.span, "ListImages", self.server.list_images(spec))
    }

    async fn list_images_with_options(&self, opts: ListImagesOptions) -> Result<Vec<ImageStatus>> {
        observe!(
            self.span,
            "ListImagesWithOptions",
            self.server.list_images_with_options(opts)
        )
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus> {
        observe!(
            self.span,
            "JobStatus",
            self.server.job_status(job_id);
            job_id = %job_id
        )
    }

    async fn sync_status(&self, git_ref: &str) -> Result<Vec<String>> {
        observe!(
            self.span,
            "SyncStatus",
            self.server.sync_status(git_ref);
            git_ref = git_ref
        )
    }

    async fn update_manifests(&self, update: UpdateSpec) -> Result<JobId> {
        observe!(
            self.span,
            "UpdateManifests",
            self.server.update_manifests(update)
        )
    }

    async fn git_repo_config(&self, regenerate: bool) -> Result<GitConfig> {
        observe!(
            self.span,
            "GitRepoConfig",
            self.server.git_repo_config(regenerate);
            regenerate = regenerate
        )
    }

    async fn ping(&self) -> Result<()> {
        observe!(self.span, "Ping", self.server.ping())
    }

    async fn version(&self) -> Result<String> {
        observe!(self.span, "Version", self.server.version())
    }

    async fn notify_change(&self, change: Change) -> Result<()> {
        observe!(self.span, "NotifyChange", self.server.notify_change(change))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{Cause, Container, JobState, ResourceId};
    use crate::error::ServerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    const EXPORTED_CONFIG: &[u8] = b"secret-config-payload";

    /// Server whose every call either succeeds with a fixed value or fails
    /// with `failure`.
    #[derive(Default)]
    struct StubServer {
        failure: Option<ServerError>,
        calls: AtomicUsize,
    }

    impl StubServer {
        fn failing(err: ServerError) -> Self {
            Self {
                failure: Some(err),
                calls: AtomicUsize::new(0),
            }
        }

        fn answer<T>(&self, value: T) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(value),
            }
        }
    }

    fn controller() -> ControllerStatus {
        ControllerStatus {
            id: Some(ResourceId("default:deployment/helloworld".to_string())),
            containers: vec![Container {
                name: "helloworld".to_string(),
                image: "quay.io/example/helloworld:master-a000001".to_string(),
            }],
            status: "ready".to_string(),
            ..Default::default()
        }
    }

    #[async_trait]
    impl Server for StubServer {
        async fn export(&self) -> Result<Vec<u8>> {
            self.answer(EXPORTED_CONFIG.to_vec())
        }

        async fn list_services(&self, _namespace: Option<&str>) -> Result<Vec<ControllerStatus>> {
            self.answer(vec![controller()])
        }

        async fn list_services_with_options(
            &self,
            _opts: ListServicesOptions,
        ) -> Result<Vec<ControllerStatus>> {
            self.answer(vec![controller()])
        }

        async fn list_images(&self, _spec: ResourceSpec) -> Result<Vec<ImageStatus>> {
            self.answer(Vec::new())
        }

        async fn list_images_with_options(
            &self,
            _opts: ListImagesOptions,
        ) -> Result<Vec<ImageStatus>> {
            self.answer(Vec::new())
        }

        async fn job_status(&self, _job_id: &JobId) -> Result<JobStatus> {
            self.answer(JobStatus {
                state: JobState::Succeeded,
                status_string: "succeeded".to_string(),
                error: None,
                result: None,
            })
        }

        async fn sync_status(&self, _git_ref: &str) -> Result<Vec<String>> {
            self.answer(vec!["a000001".to_string()])
        }

        async fn update_manifests(&self, _update: UpdateSpec) -> Result<JobId> {
            self.answer(JobId("job-1".to_string()))
        }

        async fn git_repo_config(&self, _regenerate: bool) -> Result<GitConfig> {
            self.answer(GitConfig::default())
        }

        async fn ping(&self) -> Result<()> {
            self.answer(())
        }

        async fn version(&self) -> Result<String> {
            self.answer("1.21.0".to_string())
        }

        async fn notify_change(&self, _change: Change) -> Result<()> {
            self.answer(())
        }
    }

    struct PanickingServer;

    #[async_trait]
    impl Server for PanickingServer {
        async fn export(&self) -> Result<Vec<u8>> {
            unimplemented!()
        }
        async fn list_services(&self, _: Option<&str>) -> Result<Vec<ControllerStatus>> {
            unimplemented!()
        }
        async fn list_services_with_options(
            &self,
            _: ListServicesOptions,
        ) -> Result<Vec<ControllerStatus>> {
            unimplemented!()
        }
        async fn list_images(&self, _: ResourceSpec) -> Result<Vec<ImageStatus>> {
            unimplemented!()
        }
        async fn list_images_with_options(&self, _: ListImagesOptions) -> Result<Vec<ImageStatus>> {
            unimplemented!()
        }
        async fn job_status(&self, _: &JobId) -> Result<JobStatus> {
            unimplemented!()
        }
        async fn sync_status(&self, _: &str) -> Result<Vec<String>> {
            unimplemented!()
        }
        async fn update_manifests(&self, _: UpdateSpec) -> Result<JobId> {
            unimplemented!()
        }
        async fn git_repo_config(&self, _: bool) -> Result<GitConfig> {
            unimplemented!()
        }
        async fn ping(&self) -> Result<()> {
            panic!("connection table corrupted")
        }
        async fn version(&self) -> Result<String> {
            unimplemented!()
        }
        async fn notify_change(&self, _: Change) -> Result<()> {
            unimplemented!()
        }
    }

    fn update_spec() -> UpdateSpec {
        UpdateSpec {
            kind: "image".to_string(),
            cause: Cause {
                message: "release".to_string(),
                user: "ops".to_string(),
            },
            spec: serde_json::json!({"image": "helloworld:v2"}),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_successful_calls_pass_through_without_events() {
        let proxy = ErrorLoggingServer::new(StubServer::default());

        assert_eq!(proxy.export().await, Ok(EXPORTED_CONFIG.to_vec()));
        assert_eq!(proxy.list_services(Some("default")).await, Ok(vec![controller()]));
        assert_eq!(
            proxy
                .list_services_with_options(ListServicesOptions::default())
                .await,
            Ok(vec![controller()])
        );
        assert_eq!(proxy.list_images(ResourceSpec::All).await, Ok(Vec::new()));
        assert_eq!(
            proxy.sync_status("HEAD").await,
            Ok(vec!["a000001".to_string()])
        );
        assert_eq!(
            proxy.update_manifests(update_spec()).await,
            Ok(JobId("job-1".to_string()))
        );
        assert_eq!(proxy.version().await, Ok("1.21.0".to_string()));
        assert_eq!(proxy.ping().await, Ok(()));
        assert_eq!(
            proxy
                .notify_change(Change::Image {
                    name: "helloworld".to_string()
                })
                .await,
            Ok(())
        );

        assert_eq!(proxy.inner().calls.load(Ordering::SeqCst), 9);
        assert!(!logs_contain(FAILURE_MESSAGE));
        assert!(!logs_contain("secret-config-payload"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_ping_timeout_is_returned_and_logged_once() {
        let timeout = ServerError::Timeout("timeout".to_string());
        let proxy = ErrorLoggingServer::new(StubServer::failing(timeout.clone()));

        assert_eq!(proxy.ping().await, Err(timeout));

        logs_assert(|lines: &[&str]| {
            let events: Vec<_> = lines
                .iter()
                .filter(|line| line.contains(FAILURE_MESSAGE))
                .collect();
            match events.as_slice() {
                [event] if event.contains("ERROR")
                    && event.contains("method=\"Ping\"")
                    && event.contains("error=timeout") =>
                {
                    Ok(())
                }
                other => Err(format!("unexpected failure events: {other:?}")),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_export_failure_omits_payload() {
        let err = ServerError::Unavailable("cluster unreachable".to_string());
        let proxy = ErrorLoggingServer::new(StubServer::failing(err.clone()));

        assert_eq!(proxy.export().await, Err(err));

        assert!(logs_contain("method=\"Export\""));
        assert!(logs_contain("server unavailable: cluster unreachable"));
        assert!(!logs_contain("secret-config-payload"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_each_failure_is_tagged_with_its_method() {
        let err = ServerError::Internal("boom".to_string());
        let proxy = ErrorLoggingServer::new(StubServer::failing(err.clone()));

        assert_eq!(
            proxy.job_status(&JobId("job-7".to_string())).await,
            Err(err.clone())
        );
        assert_eq!(proxy.sync_status("refs/heads/main").await, Err(err.clone()));
        assert_eq!(proxy.git_repo_config(true).await, Err(err.clone()));
        assert_eq!(proxy.list_services(Some("kube-system")).await, Err(err.clone()));
        assert_eq!(
            proxy
                .list_images_with_options(ListImagesOptions::default())
                .await,
            Err(err.clone())
        );
        assert_eq!(proxy.version().await, Err(err));

        assert!(logs_contain("method=\"JobStatus\""));
        assert!(logs_contain("job_id=job-7"));
        assert!(logs_contain("method=\"SyncStatus\""));
        assert!(logs_contain("git_ref=\"refs/heads/main\""));
        assert!(logs_contain("method=\"GitRepoConfig\""));
        assert!(logs_contain("regenerate=true"));
        assert!(logs_contain("namespace=Some(\"kube-system\")"));
        assert!(logs_contain("method=\"ListImagesWithOptions\""));
        assert!(logs_contain("method=\"Version\""));
        assert!(!logs_contain("1.21.0"));

        logs_assert(|lines: &[&str]| {
            let count = lines
                .iter()
                .filter(|line| line.contains(FAILURE_MESSAGE))
                .count();
            if count == 6 {
                Ok(())
            } else {
                Err(format!("expected 6 failure events, got {count}"))
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panicking_call_is_logged_and_resumed() {
        let proxy = ErrorLoggingServer::new(PanickingServer);

        let outcome = AssertUnwindSafe(proxy.ping()).catch_unwind().await;

        assert!(outcome.is_err());
        assert!(logs_contain("method=\"Ping\""));
        assert!(logs_contain("error=\"panicked\""));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_namespace_differs_from_empty() {
        let err = ServerError::Unavailable("cluster unreachable".to_string());
        let proxy = ErrorLoggingServer::new(StubServer::failing(err.clone()));

        assert_eq!(proxy.list_services(None).await, Err(err.clone()));
        assert_eq!(proxy.list_services(Some("")).await, Err(err));

        assert!(logs_contain("namespace=None"));
        assert!(logs_contain("namespace=Some(\"\")"));
    }

    #[tokio::test]
    async fn test_shared_between_concurrent_callers() {
        let proxy = Arc::new(ErrorLoggingServer::new(StubServer::default()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let proxy = Arc::clone(&proxy);
                tokio::spawn(async move { proxy.version().await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap(), Ok("1.21.0".to_string()));
        }
        assert_eq!(proxy.inner().calls.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn test_wraps_trait_objects() {
        let server: Arc<dyn Server> = Arc::new(StubServer::default());
        let proxy: Box<dyn Server> = Box::new(ErrorLoggingServer::new(server));

        assert_eq!(proxy.ping().await, Ok(()));
        assert_eq!(
            proxy.job_status(&JobId("job-1".to_string())).await.unwrap().state,
            JobState::Succeeded
        );
    }
}
