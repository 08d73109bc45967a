//! Upgrade cleanup procedure
//!
//! Decides which controller topology the starting driver version replaces,
//! deletes that workload and then confirms that none of its pods survive:
//! - Version classification
//! - Foreground delete of the legacy workload, tolerating not-found
//! - Polling (or a single check) for leftover controller pods

use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::ClusterClient;
use crate::config::{CleanupPolicy, ConfirmStrategy, InvalidVersionPolicy};
use crate::error::{is_not_found, Error, Result};
use crate::version::VersionSelector;
use crate::workload::{LegacyWorkloadRef, WorkloadKind, CONTROLLER_LABEL};

/// Terminal result of a successful run. Failures are returned as [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The legacy workload was deleted and no leftover pods remain
    Success,
    /// The legacy workload did not exist and no leftover pods remain
    TransientNotFound,
    /// The version was invalid and the policy says to skip
    Skipped,
}

/// What the single delete call found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Drives one cleanup run against a cluster
pub struct UpgradeCleanup<C> {
    client: C,
    policy: CleanupPolicy,
}

impl<C: ClusterClient> UpgradeCleanup<C> {
    pub fn new(client: C, policy: CleanupPolicy) -> Self {
        Self { client, policy }
    }

    /// Run the whole procedure for the version being started
    pub async fn run(&self, driver_version: &str) -> Result<CleanupOutcome> {
        match plan(driver_version, &self.policy)? {
            Some(workload) => self.execute(&workload).await,
            None => Ok(CleanupOutcome::Skipped),
        }
    }

    /// Delete the legacy workload and confirm that it is gone
    pub async fn execute(&self, workload: &LegacyWorkloadRef) -> Result<CleanupOutcome> {
        info!(
            kind = %workload.kind,
            name = %workload.name,
            namespace = %workload.namespace,
            "Retiring legacy controller workload"
        );

        let deleted = self.delete_legacy_workload(workload).await?;
        self.confirm_cleared(workload).await?;

        info!(
            kind = %workload.kind,
            "csi-init-container finished, no legacy VPC Block CSI controller pods remain"
        );

        Ok(match deleted {
            DeleteOutcome::Deleted => CleanupOutcome::Success,
            DeleteOutcome::NotFound => CleanupOutcome::TransientNotFound,
        })
    }

    /// Issue the single foreground delete for the legacy workload
    pub async fn delete_legacy_workload(
        &self,
        workload: &LegacyWorkloadRef,
    ) -> Result<DeleteOutcome> {
        match self.client.delete_workload(workload).await {
            Ok(()) => {
                info!(kind = %workload.kind, name = %workload.name, "Deleted legacy controller workload");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if is_not_found(&e) => {
                info!(
                    kind = %workload.kind,
                    name = %workload.name,
                    "Legacy controller workload not found which is expected case"
                );
                Ok(DeleteOutcome::NotFound)
            }
            Err(source) => Err(Error::Delete {
                workload: workload.clone(),
                source,
            }),
        }
    }

    /// Wait until neither the workload nor any of its pods is active
    pub async fn confirm_cleared(&self, workload: &LegacyWorkloadRef) -> Result<()> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let workload_active = self.workload_active(workload).await?;
            let leftovers = self.find_leftover_pods(workload).await?;

            if !workload_active && leftovers.is_empty() {
                info!(attempt, "No leftover controller pods found");
                return Ok(());
            }

            let names: Vec<String> = leftovers.iter().map(|p| p.name_any()).collect();
            warn!(
                attempt,
                workload_active,
                pods = ?names,
                "Legacy controller still present"
            );

            let mut pods_removed = false;
            if self.policy.delete_leftover_pods && !leftovers.is_empty() {
                self.delete_leftover_pods(&workload.namespace, &names).await?;
                pods_removed = true;
            }

            let elapsed = started.elapsed();
            match self.policy.confirm {
                ConfirmStrategy::OneShot => {
                    if pods_removed && !workload_active {
                        return Ok(());
                    }
                    return Err(still_present(workload, names, workload_active, elapsed));
                }
                ConfirmStrategy::Poll { interval, timeout } => {
                    if elapsed + interval > timeout {
                        return Err(still_present(workload, names, workload_active, elapsed));
                    }
                    sleep(interval).await;
                }
            }
        }
    }

    /// Pods in the namespace that belong to the legacy workload
    pub async fn find_leftover_pods(&self, workload: &LegacyWorkloadRef) -> Result<Vec<Pod>> {
        let pods = self
            .client
            .list_pods(&workload.namespace, CONTROLLER_LABEL)
            .await
            .map_err(|source| Error::List {
                namespace: workload.namespace.clone(),
                selector: CONTROLLER_LABEL.to_string(),
                source,
            })?;

        Ok(pods
            .into_iter()
            .filter(|pod| is_leftover(pod, workload, self.policy.excluded_uid()))
            .collect())
    }

    /// True when the workload exists and is not marked for deletion
    async fn workload_active(&self, workload: &LegacyWorkloadRef) -> Result<bool> {
        let meta = self
            .client
            .get_workload(workload)
            .await
            .map_err(|source| Error::Get {
                workload: workload.clone(),
                source,
            })?;
        Ok(meta.is_some_and(|m| m.deletion_timestamp.is_none()))
    }

    async fn delete_leftover_pods(&self, namespace: &str, names: &[String]) -> Result<()> {
        for name in names {
            match self.client.delete_pod(namespace, name).await {
                Ok(()) => info!(pod = %name, "Pod deleted successfully"),
                Err(e) if is_not_found(&e) => {
                    info!(pod = %name, "CSI Controller pod not found which is expected case")
                }
                Err(source) => {
                    return Err(Error::PodDelete {
                        namespace: namespace.to_string(),
                        pod: name.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Work out which workload the starting version retires.
///
/// `Ok(None)` means the version is invalid and the policy skips cleanup.
pub fn plan(driver_version: &str, policy: &CleanupPolicy) -> Result<Option<LegacyWorkloadRef>> {
    let kind = match VersionSelector::classify(driver_version) {
        VersionSelector::LegacyDeployment => WorkloadKind::Deployment,
        VersionSelector::LegacyStatefulSet => WorkloadKind::StatefulSet,
        VersionSelector::Invalid(invalid) => {
            return match policy.invalid_version {
                InvalidVersionPolicy::Fatal => Err(invalid.into()),
                InvalidVersionPolicy::Skip => {
                    warn!(
                        version = %driver_version,
                        reason = ?invalid,
                        "Driver version not recognised, skipping cleanup"
                    );
                    Ok(None)
                }
            };
        }
    };
    Ok(Some(LegacyWorkloadRef::controller(kind)))
}

fn still_present(
    workload: &LegacyWorkloadRef,
    pods: Vec<String>,
    workload_active: bool,
    elapsed: Duration,
) -> Error {
    if pods.is_empty() && workload_active {
        Error::WorkloadActive {
            workload: workload.clone(),
            elapsed,
        }
    } else {
        Error::LeftoverPods {
            namespace: workload.namespace.clone(),
            pods,
            elapsed,
        }
    }
}

/// Decide whether a listed pod is left over from the legacy workload.
///
/// A pod counts when its name carries the controller prefix, it is not the
/// pod identified by `self_uid`, and it is not owned by the topology that
/// replaces the legacy one. Pods without owner references count.
pub fn is_leftover(pod: &Pod, workload: &LegacyWorkloadRef, self_uid: Option<&str>) -> bool {
    if !pod.name_any().starts_with(workload.pod_prefix()) {
        return false;
    }

    if let Some(uid) = self_uid {
        if pod.metadata.uid.as_deref() == Some(uid) {
            debug!(pod = %pod.name_any(), uid, "Skipping own pod");
            return false;
        }
    }

    !owned_by(pod, workload.kind.counterpart())
}

fn owned_by(pod: &Pod, kind: WorkloadKind) -> bool {
    pod.owner_references()
        .iter()
        .any(|owner| owner.kind == kind.pod_owner_kind())
}
