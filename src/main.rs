//! pkgi - PackageInstall controller

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pkgi::controller::{error_policy, reconcile, Context};
use pkgi::crd::{all_crds, owned_crds, App, Package, PackageInstall};
use pkgi::packageinstall::{desired_app, AppOptions};
use pkgi::Error;

/// pkgi - turns PackageInstalls into Apps
#[derive(Parser, Debug)]
#[command(name = "pkgi", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches PackageInstalls and the Apps they own, keeping every App in
    /// line with its selected Package.
    Controller(ControllerArgs),

    /// Print the App a PackageInstall would produce, without a cluster
    Synthesize(SynthesizeArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug)]
struct ControllerArgs {
    /// Sync period for PackageInstalls that do not set one
    #[arg(
        long,
        env = "PKGI_DEFAULT_SYNC_PERIOD",
        default_value = "10m",
        value_parser = humantime::parse_duration
    )]
    default_sync_period: Duration,

    /// Namespace whose Packages are available in every namespace
    #[arg(long, env = "PKGI_PACKAGING_GLOBAL_NAMESPACE")]
    packaging_global_namespace: Option<String>,

    /// Seconds to wait before retrying a failed reconcile
    #[arg(long, default_value = "30")]
    requeue_on_error: u64,
}

/// Synthesize mode arguments
#[derive(Parser, Debug)]
struct SynthesizeArgs {
    /// PackageInstall YAML
    #[arg(long)]
    install: PathBuf,

    /// Package YAML
    #[arg(long)]
    package: PathBuf,

    /// Currently stored App YAML
    #[arg(long)]
    existing: Option<PathBuf>,

    /// Sync period used when the PackageInstall does not set one
    #[arg(long, default_value = "10m", value_parser = humantime::parse_duration)]
    default_sync_period: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        for crd in all_crds() {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| Error::serialization(format!("CRD: {}", e)))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    match cli.command {
        Some(Commands::Synthesize(args)) => run_synthesize(args).await,
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => run_controller(ControllerArgs::parse_from(["controller"])).await,
    }
}

/// Read one resource from a YAML file
async fn read_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", path, e))?;
    let value = serde_yaml::from_str(&content)
        .map_err(|e| Error::serialization(format!("{}: {}", path.display(), e)))?;
    Ok(value)
}

/// Run synthesis over local files and print the resulting App
async fn run_synthesize(args: SynthesizeArgs) -> anyhow::Result<()> {
    let install: PackageInstall = read_yaml(&args.install).await?;
    let package: Package = read_yaml(&args.package).await?;
    let existing: Option<App> = match &args.existing {
        Some(path) => Some(read_yaml(path).await?),
        None => None,
    };

    let opts = AppOptions::default().default_sync_period(args.default_sync_period);
    let app = desired_app(existing.as_ref(), &install, &package, &opts)?;

    let yaml = serde_yaml::to_string(&app)
        .map_err(|e| Error::serialization(format!("App: {}", e)))?;
    print!("{yaml}");
    Ok(())
}

/// Ensure the PackageInstall CRD is installed
///
/// The controller installs the CRD it owns on startup using server-side
/// apply. Package and App CRDs belong to other controllers and are left alone.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply("pkgi-controller").force();

    for crd in owned_crds() {
        let name = crd.metadata.name.clone().unwrap_or_default();
        tracing::info!(crd = %name, "Installing CRD...");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("PackageInstall CRD installed/updated");
    Ok(())
}

/// Run the PackageInstall controller until shutdown
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let mut builder = Context::builder(client.clone())
        .default_sync_period(args.default_sync_period)
        .error_requeue(Duration::from_secs(args.requeue_on_error));
    if let Some(namespace) = args.packaging_global_namespace {
        tracing::info!(%namespace, "Using global packaging namespace");
        builder = builder.packaging_global_namespace(namespace);
    }
    let ctx = Arc::new(builder.build());

    let installs: Api<PackageInstall> = Api::all(client.clone());
    let apps: Api<App> = Api::all(client);

    tracing::info!("Starting PackageInstall controller");

    Controller::new(installs, WatcherConfig::default())
        .owns(apps, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "PackageInstall reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "PackageInstall reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("PackageInstall controller stopped");
    Ok(())
}
