//! Error types for the CSI init container

use std::time::Duration;

use thiserror::Error;

use crate::workload::{LegacyWorkloadRef, WorkloadKind};

/// Result type alias using the init container's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Guidance printed when no resource-specific command applies
pub const GENERIC_REMEDIATION: &str = "Please check if any older version VPC Block CSI Driver \
    version is running. Please disable and enable the VPC Block CSI Driver. If error persists \
    open support ticket";

/// Init container error types
#[derive(Error, Debug)]
pub enum Error {
    /// Driver version is not a number
    #[error("Unable to parse driver version '{value}': {reason}")]
    VersionParse { value: String, reason: String },

    /// Driver version is a number but not a supported one
    #[error("Unsupported driver version '{0}': expected 5.1, or 5.2 and above")]
    InvalidVersion(String),

    /// Kubernetes client could not be built
    #[error("Unable to create Kubernetes client: {0}")]
    ClientInit(String),

    /// Deleting the legacy workload failed for a reason other than not-found
    #[error("Failed to delete {workload}: {source}")]
    Delete {
        workload: LegacyWorkloadRef,
        #[source]
        source: kube::Error,
    },

    /// Listing controller pods failed
    #[error("Failed to list pods in {namespace} with selector '{selector}': {source}")]
    List {
        namespace: String,
        selector: String,
        #[source]
        source: kube::Error,
    },

    /// Reading the legacy workload back failed
    #[error("Failed to get {workload}: {source}")]
    Get {
        workload: LegacyWorkloadRef,
        #[source]
        source: kube::Error,
    },

    /// Deleting a leftover controller pod failed
    #[error("Failed to delete pod {namespace}/{pod}: {source}")]
    PodDelete {
        namespace: String,
        pod: String,
        #[source]
        source: kube::Error,
    },

    /// Leftover controller pods outlived the confirmation budget
    #[error("Leftover controller pods still present in {namespace} after {elapsed:?}: {}", .pods.join(", "))]
    LeftoverPods {
        namespace: String,
        pods: Vec<String>,
        elapsed: Duration,
    },

    /// The legacy workload exists and is not being deleted
    #[error("{workload} is still active after {elapsed:?}")]
    WorkloadActive {
        workload: LegacyWorkloadRef,
        elapsed: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a client initialization error
    pub fn client_init(msg: impl Into<String>) -> Self {
        Error::ClientInit(msg.into())
    }

    /// Manual step an operator should take to unblock the driver
    pub fn remediation(&self) -> String {
        match self {
            Error::Delete { workload, .. }
            | Error::Get { workload, .. }
            | Error::WorkloadActive { workload, .. } => delete_workload_command(workload),
            Error::PodDelete { namespace, pod, .. } => format!(
                "Please cleanup the pod manually so that VPC Block CSI Driver is up and running. \
                 Run command \"kubectl delete pod -n {} {}\"",
                namespace, pod
            ),
            Error::LeftoverPods {
                namespace, pods, ..
            } => format!(
                "Please cleanup the pods manually so that VPC Block CSI Driver is up and running. \
                 Run command \"kubectl delete pod -n {} {}\"",
                namespace,
                pods.join(" ")
            ),
            Error::List { namespace, .. } => format!(
                "Please cleanup the pods manually so that VPC Block CSI Driver is up and running. \
                 Run command \"kubectl delete pod -n {} {}-xxx\"",
                namespace,
                crate::workload::CONTROLLER_NAME
            ),
            _ => GENERIC_REMEDIATION.to_string(),
        }
    }

    /// Kind of the workload an error is about, if any
    pub fn workload_kind(&self) -> Option<WorkloadKind> {
        match self {
            Error::Delete { workload, .. }
            | Error::Get { workload, .. }
            | Error::WorkloadActive { workload, .. } => Some(workload.kind),
            _ => None,
        }
    }
}

fn delete_workload_command(workload: &LegacyWorkloadRef) -> String {
    format!(
        "Please cleanup the {kind} manually so that VPC Block CSI Driver is up and running. \
         Run command with admin access \"kubectl delete {resource} -n {ns} {name}\"",
        kind = workload.kind,
        resource = workload.kind.kubectl_resource(),
        ns = workload.namespace,
        name = workload.name
    )
}

/// True when the API server answered 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}
