//! Identity of the controller workload that an upgrade retires

use std::fmt;

/// Name shared by the Deployment and StatefulSet flavours of the controller
pub const CONTROLLER_NAME: &str = "ibm-vpc-block-csi-controller";

/// Namespace the driver is installed into
pub const NAMESPACE: &str = "kube-system";

/// Label carried by every pod of the driver, controller and node alike
pub const CONTROLLER_LABEL: &str = "app=ibm-vpc-block-csi-driver";

/// Workload kinds the controller has been shipped as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    /// Kind name as it appears in `kind:` and owner references
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }

    /// Owner kind found on pods of this workload kind.
    ///
    /// Deployment pods are owned by their ReplicaSet, never by the
    /// Deployment itself.
    pub fn pod_owner_kind(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "ReplicaSet",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }

    /// The other topology
    pub fn counterpart(&self) -> WorkloadKind {
        match self {
            WorkloadKind::Deployment => WorkloadKind::StatefulSet,
            WorkloadKind::StatefulSet => WorkloadKind::Deployment,
        }
    }

    /// Resource name accepted by `kubectl`
    pub fn kubectl_resource(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulset",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The legacy controller workload to remove for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyWorkloadRef {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
}

impl LegacyWorkloadRef {
    /// Reference the controller workload of the given kind
    pub fn controller(kind: WorkloadKind) -> Self {
        Self {
            kind,
            name: CONTROLLER_NAME.to_string(),
            namespace: NAMESPACE.to_string(),
        }
    }

    /// Pod name prefix shared by every pod this workload can own
    pub fn pod_prefix(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for LegacyWorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_ref_uses_fixed_identity() {
        let workload = LegacyWorkloadRef::controller(WorkloadKind::StatefulSet);
        assert_eq!(workload.name, "ibm-vpc-block-csi-controller");
        assert_eq!(workload.namespace, "kube-system");
        assert_eq!(
            workload.to_string(),
            "StatefulSet kube-system/ibm-vpc-block-csi-controller"
        );
    }

    #[test]
    fn test_pod_owner_kind() {
        assert_eq!(WorkloadKind::Deployment.pod_owner_kind(), "ReplicaSet");
        assert_eq!(WorkloadKind::StatefulSet.pod_owner_kind(), "StatefulSet");
        assert_eq!(
            WorkloadKind::Deployment.counterpart(),
            WorkloadKind::StatefulSet
        );
    }
}
