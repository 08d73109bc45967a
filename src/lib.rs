//! VPC Block CSI init container
//!
//! Runs before the CSI controller starts during a driver upgrade and removes
//! the controller workload left behind by the other deployment topology
//! (Deployment or StatefulSet), then confirms none of its pods survive.

pub mod cleanup;
pub mod client;
pub mod config;
pub mod error;
pub mod version;
pub mod workload;

pub use error::{Error, Result};
