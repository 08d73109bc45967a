//! Cluster access for the cleanup procedure
//!
//! The procedure only talks to the API server through [`ClusterClient`], so
//! tests can substitute an in-memory cluster for the real one.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::info;

#[cfg(test)]
use mockall::automock;

use crate::error::Error;
use crate::workload::{LegacyWorkloadRef, WorkloadKind};

/// Operations the cleanup procedure needs from the cluster.
///
/// Errors are returned unmodified so callers can tell a 404 apart from any
/// other failure.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Delete a controller workload with foreground cascading
    async fn delete_workload(&self, workload: &LegacyWorkloadRef) -> Result<(), kube::Error>;

    /// Fetch a controller workload's metadata, `None` when it does not exist
    async fn get_workload(
        &self,
        workload: &LegacyWorkloadRef,
    ) -> Result<Option<ObjectMeta>, kube::Error>;

    /// List pods in a namespace matching a label selector
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, kube::Error>;

    /// Delete a single pod by name
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;
}

/// [`ClusterClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn delete_workload(&self, workload: &LegacyWorkloadRef) -> Result<(), kube::Error> {
        let dp = DeleteParams::foreground();
        match workload.kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                api.delete(&workload.name, &dp).await?;
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                api.delete(&workload.name, &dp).await?;
            }
        }
        Ok(())
    }

    async fn get_workload(
        &self,
        workload: &LegacyWorkloadRef,
    ) -> Result<Option<ObjectMeta>, kube::Error> {
        let meta = match workload.kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                api.get_opt(&workload.name).await?.map(|d| d.metadata)
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                api.get_opt(&workload.name).await?.map(|s| s.metadata)
            }
        };
        Ok(meta)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default().labels(selector)).await?;
        Ok(pods.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Build an authenticated client.
///
/// Uses the kubeconfig at `kubeconfig` when given, otherwise the in-cluster
/// service account. Every request is bounded by `request_timeout`.
pub async fn connect(
    kubeconfig: Option<&Path>,
    request_timeout: Duration,
) -> crate::error::Result<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            info!(path = %path.display(), "Loading kubeconfig");
            let kc = Kubeconfig::read_from(path).map_err(|e| {
                Error::client_init(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::client_init(e.to_string()))?
        }
        None => Config::incluster().map_err(|e| {
            Error::client_init(format!("failed to load in-cluster configuration: {}", e))
        })?,
    };

    config.connect_timeout = Some(request_timeout);
    config.read_timeout = Some(request_timeout);
    config.write_timeout = Some(request_timeout);

    Client::try_from(config).map_err(|e| Error::client_init(e.to_string()))
}
