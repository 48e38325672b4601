// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote server capability set and the values it exchanges.
//!
//! The types here only describe the shape of requests and responses so that
//! a transport can put them on the wire; what a call actually does is up to
//! the implementation of [`Server`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of a workload resource, e.g. `default:deployment/helloworld`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an asynchronous job queued by [`Server::update_manifests`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub id: Option<ResourceId>,
    pub containers: Vec<Container>,
    pub status: String,
    pub sync_error: Option<String>,
    pub automated: bool,
    pub locked: bool,
    pub ignore: bool,
    pub policies: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStatus {
    pub id: ResourceId,
    pub containers: Vec<Container>,
}

/// Which resources a listing or release applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSpec {
    #[default]
    All,
    Id(ResourceId),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListServicesOptions {
    pub namespace: Option<String>,
    pub services: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListImagesOptions {
    pub spec: ResourceSpec,
    pub override_container_fields: Vec<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub status_string: String,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    pub message: String,
    pub user: String,
}

/// A requested change to the manifests. `spec` is interpreted by the
/// implementation according to `kind` (image release, policy update, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpec {
    pub kind: String,
    pub cause: Cause,
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GitRemoteConfig {
    pub url: String,
    pub branch: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GitConfig {
    pub remote: GitRemoteConfig,
    pub public_ssh_key: String,
    pub status: String,
}

/// Notification that something upstream of the daemon changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    Git { url: String, branch: String },
    Image { name: String },
}

/// Everything a daemon answers to over the remote API.
///
/// Cancellation follows the usual async contract: dropping the returned
/// future abandons the call.
#[async_trait]
pub trait Server: Send + Sync {
    /// Exports the complete cluster configuration.
    async fn export(&self) -> Result<Vec<u8>>;

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<ControllerStatus>>;

    async fn list_services_with_options(
        &self,
        opts: ListServicesOptions,
    ) -> Result<Vec<ControllerStatus>>;

    async fn list_images(&self, spec: ResourceSpec) -> Result<Vec<ImageStatus>>;

    async fn list_images_with_options(&self, opts: ListImagesOptions) -> Result<Vec<ImageStatus>>;

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus>;

    /// Commits between the given ref and what is currently applied.
    async fn sync_status(&self, git_ref: &str) -> Result<Vec<String>>;

    async fn update_manifests(&self, update: UpdateSpec) -> Result<JobId>;

    async fn git_repo_config(&self, regenerate: bool) -> Result<GitConfig>;

    async fn ping(&self) -> Result<()>;

    async fn version(&self) -> Result<String>;

    async fn notify_change(&self, change: Change) -> Result<()>;
}

macro_rules! forward_server_impl {
    ($wrapper:ident) => {
        #[async_trait]
        impl<S: Server + ?Sized> Server for $wrapper<S> {
            async fn export(&self) -> Result<Vec<u8>> {
                (**self).export().await
            }

            async fn list_services(
                &self,
                namespace: Option<&str>,
            ) -> Result<Vec<ControllerStatus>> {
                (**self).list_services(namespace).await
            }

            async fn list_services_with_options(
                &self,
                opts: ListServicesOptions,
            ) -> Result<Vec<ControllerStatus>> {
                (**self).list_services_with_options(opts).await
            }

            async fn list_images(&self, spec: ResourceSpec) -> Result<Vec<ImageStatus>> {
                (**self).list_images(spec).await
            }

            async fn list_images_with_options(
                &self,
                opts: ListImagesOptions,
            ) -> Result<Vec<ImageStatus>> {
                (**self).list_images_with_options(opts).await
            }

            async fn job_status(&self, job_id: &JobId) -> Result<JobStatus> {
                (**self).job_status(job_id).await
            }

            async fn sync_status(&self, git_ref: &str) -> Result<Vec<String>> {
                (**self).sync_status(git_ref).await
            }

            async fn update_manifests(&self, update: UpdateSpec) -> Result<JobId> {
                (**self).update_manifests(update).await
            }

            async fn git_repo_config(&self, regenerate: bool) -> Result<GitConfig> {
                (**self).git_repo_config(regenerate).await
            }

            async fn ping(&self) -> Result<()> {
                (**self).ping().await
            }

            async fn version(&self) -> Result<String> {
                (**self).version().await
            }

            async fn notify_change(&self, change: Change) -> Result<()> {
                (**self).notify_change(change).await
            }
        }
    };
}

forward_server_impl!(Arc);
forward_server_impl!(Box);
