//! PackageInstall controller implementation
//!
//! Each reconcile selects the Package version to install, synthesizes the
//! desired App, writes it when it differs from the stored one, and mirrors
//! the App's progress into the PackageInstall status.
//!
//! The App is owned by its PackageInstall, so deleting the PackageInstall
//! garbage collects the App without any work here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{
    App, Condition, ConditionStatus, ConditionType, Package, PackageInstall, PackageInstallStatus,
};
use crate::packageinstall::{desired_app, merge_package_sources, select_package, AppOptions};
use crate::{Error, DEFAULT_ERROR_REQUEUE};

/// Field manager used for status patches
const FIELD_MANAGER: &str = "pkgi-controller";

/// Trait abstracting Kubernetes client operations for PackageInstall
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// List the Packages in a namespace
    async fn list_packages(&self, namespace: &str) -> Result<Vec<Package>, Error>;

    /// Get an App by namespace and name, `None` when it does not exist
    async fn get_app(&self, namespace: &str, name: &str) -> Result<Option<App>, Error>;

    /// Create an App
    async fn create_app(&self, app: &App) -> Result<App, Error>;

    /// Replace an existing App (optimistic concurrency via resourceVersion)
    async fn replace_app(&self, app: &App) -> Result<App, Error>;

    /// Patch the status of a PackageInstall
    async fn patch_install_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PackageInstallStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn apps(&self, app: &App) -> Result<Api<App>, Error> {
        let namespace = app
            .namespace()
            .ok_or_else(|| Error::validation(format!("App {} has no namespace", app.name_any())))?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn list_packages(&self, namespace: &str) -> Result<Vec<Package>, Error> {
        let api: Api<Package> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_app(&self, namespace: &str, name: &str) -> Result<Option<App>, Error> {
        let api: Api<App> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(app) => Ok(Some(app)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_app(&self, app: &App) -> Result<App, Error> {
        Ok(self.apps(app)?.create(&PostParams::default(), app).await?)
    }

    async fn replace_app(&self, app: &App) -> Result<App, Error> {
        Ok(self
            .apps(app)?
            .replace(&app.name_any(), &PostParams::default(), app)
            .await?)
    }

    async fn patch_install_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PackageInstallStatus,
    ) -> Result<(), Error> {
        let api: Api<PackageInstall> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Controller context for PackageInstall reconciliation
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// App synthesis settings
    pub app_options: AppOptions,
    /// Namespace whose Packages are visible to every PackageInstall
    pub packaging_global_namespace: Option<String>,
    /// Delay before retrying a failed reconcile
    pub error_requeue: Duration,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with a mock client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self {
            kube,
            app_options: AppOptions::default(),
            packaging_global_namespace: None,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .default_sync_period(Duration::from_secs(600))
///     .packaging_global_namespace("pkgi-global")
///     .build();
/// ```
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    app_options: AppOptions,
    packaging_global_namespace: Option<String>,
    error_requeue: Duration,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            app_options: AppOptions::default(),
            packaging_global_namespace: None,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }

    /// Sync period for PackageInstalls that do not set one
    pub fn default_sync_period(mut self, period: Duration) -> Self {
        self.app_options = self.app_options.default_sync_period(period);
        self
    }

    /// Namespace holding Packages shared with every namespace
    pub fn packaging_global_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.packaging_global_namespace = Some(namespace.into());
        self
    }

    /// Delay before retrying a failed reconcile
    pub fn error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone()))),
            app_options: self.app_options,
            packaging_global_namespace: self.packaging_global_namespace,
            error_requeue: self.error_requeue,
        }
    }
}

/// Reconcile a PackageInstall resource
#[instrument(skip(install, ctx), fields(package_install = %install.name_any()))]
pub async fn reconcile(install: Arc<PackageInstall>, ctx: Arc<Context>) -> Result<Action, Error> {
    if install.metadata.deletion_timestamp.is_some() {
        debug!("PackageInstall is being deleted, App is garbage collected");
        return Ok(Action::await_change());
    }

    let name = install.name_any();
    let namespace = install
        .namespace()
        .ok_or_else(|| Error::validation(format!("PackageInstall {} has no namespace", name)))?;

    info!("reconciling package install");

    match install_app(&install, &ctx, &namespace).await {
        Ok(version) => {
            let sync_period = install
                .spec
                .sync_period
                .unwrap_or(ctx.app_options.default_sync_period);
            debug!(%version, ?sync_period, "package install reconciled");
            Ok(Action::requeue(sync_period))
        }
        Err(e) => {
            warn!(error = %e, "package install reconcile failed");
            let status = failed_status(&install, &e);
            if let Err(status_err) = ctx
                .kube
                .patch_install_status(&namespace, &name, &status)
                .await
            {
                warn!(error = %status_err, "failed to record failure in status");
            }

            match e {
                // Needs a spec change; wait for one
                Error::Validation(_) | Error::Configuration(_) => Ok(Action::await_change()),
                e => Err(e),
            }
        }
    }
}

/// Select the Package, write the App and report status; returns the installed version
async fn install_app(
    install: &PackageInstall,
    ctx: &Context,
    namespace: &str,
) -> Result<String, Error> {
    let name = install.name_any();
    let package_ref = install
        .spec
        .package_ref
        .as_ref()
        .ok_or_else(|| Error::validation(format!("PackageInstall {} has no packageRef", name)))?;

    let local = ctx.kube.list_packages(namespace).await?;
    let packages = match ctx.packaging_global_namespace.as_deref() {
        Some(global) if global != namespace => {
            merge_package_sources(local, ctx.kube.list_packages(global).await?)
        }
        _ => local,
    };
    let package = select_package(&packages, package_ref)?;
    let version = package.spec.version.clone();
    debug!(%version, package = %package.name_any(), "selected package");

    let existing = ctx.kube.get_app(namespace, &name).await?;
    let desired = desired_app(existing.as_ref(), install, package, &ctx.app_options)?;

    let app = match existing {
        None => {
            info!(%version, "creating App");
            ctx.kube.create_app(&desired).await?
        }
        Some(existing) if existing == desired => {
            debug!("App is up to date");
            existing
        }
        Some(_) => {
            info!(%version, "updating App");
            ctx.kube.replace_app(&desired).await?
        }
    };

    let status = status_from_app(install, &app, &version);
    ctx.kube
        .patch_install_status(namespace, &name, &status)
        .await?;

    Ok(version)
}

/// PackageInstall status reflecting the App's progress at `version`
///
/// An App whose status predates its current generation is still reconciling,
/// whatever its conditions say.
pub fn status_from_app(install: &PackageInstall, app: &App, version: &str) -> PackageInstallStatus {
    let app_status = app.status.as_ref().filter(|s| {
        match (s.observed_generation, app.metadata.generation) {
            (Some(observed), Some(current)) => observed >= current,
            _ => true,
        }
    });

    let (condition, description, useful_error_message) = match app_status {
        Some(s) if s.has_condition(ConditionType::ReconcileFailed) => (
            Condition::new(ConditionType::ReconcileFailed, ConditionStatus::True)
                .reason("AppReconcileFailed")
                .message("Error (see .status.usefulErrorMessage for details)"),
            "Reconcile failed",
            s.useful_error_message.clone(),
        ),
        Some(s) if s.has_condition(ConditionType::ReconcileSucceeded) => (
            Condition::new(ConditionType::ReconcileSucceeded, ConditionStatus::True),
            "Reconcile succeeded",
            None,
        ),
        _ => (
            Condition::new(ConditionType::Reconciling, ConditionStatus::True),
            "Reconciling",
            None,
        ),
    };

    PackageInstallStatus {
        observed_generation: install.metadata.generation,
        conditions: vec![condition],
        friendly_description: Some(description.to_string()),
        useful_error_message,
        version: Some(version.to_string()),
        last_attempted_version: Some(version.to_string()),
    }
}

/// PackageInstall status for a reconcile that failed before the App was written
///
/// The previously installed version is kept.
pub fn failed_status(install: &PackageInstall, error: &Error) -> PackageInstallStatus {
    let previous = install.status.as_ref();
    PackageInstallStatus {
        observed_generation: install.metadata.generation,
        conditions: vec![
            Condition::new(ConditionType::ReconcileFailed, ConditionStatus::True)
                .reason(error.reason())
                .message(error.to_string()),
        ],
        friendly_description: Some(format!("Reconcile failed: {}", error)),
        useful_error_message: Some(error.to_string()),
        version: previous.and_then(|s| s.version.clone()),
        last_attempted_version: previous.and_then(|s| s.last_attempted_version.clone()),
    }
}

/// Error policy for PackageInstall reconciliation
pub fn error_policy(install: Arc<PackageInstall>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        package_install = %install.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.error_requeue)
}
