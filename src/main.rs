//! VPC Block CSI init container
//!
//! Main entry point. Parses flags, builds the Kubernetes client and runs the
//! upgrade cleanup once; any failure exits non-zero so the kubelet retries
//! the init container.

use clap::Parser;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use csi_init::{
    cleanup::{self, CleanupOutcome, UpgradeCleanup},
    client::{self, KubeClusterClient},
    config::Args,
    Error,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing();

    let span = info_span!("csi-init-container", version = %args.driver_version);
    if let Err(e) = run(&args).instrument(span).await {
        error!(
            error = %e,
            kind = e.workload_kind().map(|k| k.as_str()),
            remediation = %e.remediation(),
            "csi-init-container failed"
        );
        return Err(e.into());
    }
    Ok(())
}

async fn run(args: &Args) -> Result<(), Error> {
    info!("Starting csi-init-container");

    let policy = args.policy()?;
    info!(?policy, "Loaded cleanup policy");

    // A skipped run never connects to the cluster
    let Some(workload) = cleanup::plan(&args.driver_version, &policy)? else {
        info!("Cleanup skipped");
        return Ok(());
    };

    let kube_client = client::connect(args.kube_config.as_deref(), args.request_timeout).await?;
    info!("Connected to Kubernetes API server");

    let procedure = UpgradeCleanup::new(KubeClusterClient::new(kube_client), policy);
    match procedure.execute(&workload).await? {
        CleanupOutcome::Success => info!("Legacy controller workload removed"),
        CleanupOutcome::TransientNotFound => info!("No legacy controller workload was present"),
        CleanupOutcome::Skipped => info!("Cleanup skipped"),
    }
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
