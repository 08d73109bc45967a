//! Command-line configuration and cleanup policy

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::error::{Error, Result};

/// Default delay between confirmation queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default time budget for confirming cleanup
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Retire the controller workload left behind by a different driver version
#[derive(Parser, Debug)]
#[command(name = "csi-init-container", version, about, long_about = None)]
pub struct Args {
    /// Driver version being started. Possible values 5.1, 5.2 or greater
    #[arg(long = "driverVersion")]
    pub driver_version: String,

    /// Path to a kubeconfig file; in-cluster credentials are used when absent
    #[arg(long = "kubeConfig")]
    pub kube_config: Option<PathBuf>,

    /// UID of the pod this container runs in
    #[arg(long = "podUid", env = "POD_UID")]
    pub pod_uid: Option<String>,

    /// Never treat the pod this container runs in as a leftover
    #[arg(long = "selfExclusion", default_value_t = true, action = ArgAction::Set)]
    pub self_exclusion: bool,

    /// How to confirm that no leftover controller pods remain
    #[arg(long = "confirmMode", value_enum, default_value_t = ConfirmMode::Poll)]
    pub confirm_mode: ConfirmMode,

    /// Delay between confirmation queries
    #[arg(long = "pollInterval", value_parser = humantime::parse_duration, default_value = "2s")]
    pub poll_interval: Duration,

    /// Give up confirming after this long
    #[arg(long = "pollTimeout", value_parser = humantime::parse_duration, default_value = "60s")]
    pub poll_timeout: Duration,

    /// Connect, read and write timeout for each API request
    #[arg(long = "requestTimeout", value_parser = humantime::parse_duration, default_value = "30s")]
    pub request_timeout: Duration,

    /// What to do with a driver version that cannot be classified
    #[arg(long = "invalidVersion", value_enum, default_value_t = InvalidVersionPolicy::Fatal)]
    pub invalid_version: InvalidVersionPolicy,

    /// Delete leftover controller pods instead of only waiting for them
    #[arg(long = "deleteLeftoverPods", default_value_t = false, action = ArgAction::Set)]
    pub delete_leftover_pods: bool,
}

/// Confirmation mode selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfirmMode {
    /// Query until clear or out of time
    Poll,
    /// Query once
    OneShot,
}

/// Handling of versions that map to no known topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InvalidVersionPolicy {
    /// Fail the init container
    Fatal,
    /// Log and exit successfully without touching the cluster
    Skip,
}

/// How leftover pods are confirmed gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmStrategy {
    OneShot,
    Poll { interval: Duration, timeout: Duration },
}

/// Knobs for one cleanup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub confirm: ConfirmStrategy,
    pub invalid_version: InvalidVersionPolicy,
    /// Identity of the running pod
    pub self_uid: Option<String>,
    pub self_exclusion: bool,
    pub delete_leftover_pods: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            confirm: ConfirmStrategy::Poll {
                interval: DEFAULT_POLL_INTERVAL,
                timeout: DEFAULT_POLL_TIMEOUT,
            },
            invalid_version: InvalidVersionPolicy::Fatal,
            self_uid: None,
            self_exclusion: true,
            delete_leftover_pods: false,
        }
    }
}

impl CleanupPolicy {
    /// UID to exclude from leftovers, if exclusion is enabled and known
    pub fn excluded_uid(&self) -> Option<&str> {
        if self.self_exclusion {
            self.self_uid.as_deref()
        } else {
            None
        }
    }
}

impl Args {
    /// Validate the arguments and turn them into a cleanup policy
    pub fn policy(&self) -> Result<CleanupPolicy> {
        let confirm = match self.confirm_mode {
            ConfirmMode::OneShot => ConfirmStrategy::OneShot,
            ConfirmMode::Poll => {
                if self.poll_interval.is_zero() {
                    return Err(Error::config("pollInterval must be greater than zero"));
                }
                if self.poll_timeout < self.poll_interval {
                    return Err(Error::config(format!(
                        "pollTimeout ({:?}) must not be shorter than pollInterval ({:?})",
                        self.poll_timeout, self.poll_interval
                    )));
                }
                ConfirmStrategy::Poll {
                    interval: self.poll_interval,
                    timeout: self.poll_timeout,
                }
            }
        };

        if self.request_timeout.is_zero() {
            return Err(Error::config("requestTimeout must be greater than zero"));
        }

        let self_uid = self
            .pod_uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(str::to_string);

        Ok(CleanupPolicy {
            confirm,
            invalid_version: self.invalid_version,
            self_uid,
            self_exclusion: self.self_exclusion,
            delete_leftover_pods: self.delete_leftover_pods,
        })
    }
}
