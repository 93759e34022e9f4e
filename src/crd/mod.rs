//! Custom Resource Definitions for pkgi
//!
//! PackageInstall is the request, Package the released content, App the
//! synthesized result handed to the App controller.
//!
//! Only PackageInstall belongs to pkgi. Package and App are modelled for
//! reading and writing instances; their CRDs are owned by the packaging and
//! App controllers.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

mod app;
mod fetch;
mod package;
mod package_install;
mod template;
mod types;

pub use app::{App, AppSpec, AppStatus};
pub use fetch::{
    FetchGit, FetchHelmChart, FetchHttp, FetchImage, FetchImgpkgBundle, FetchInline, FetchStep,
    HelmChartRepository, InlineSource, InlineSourceRef, LocalRef,
};
pub use package::{AppTemplateSpec, Package, PackageSpec};
pub use package_install::{
    PackageInstall, PackageInstallSpec, PackageInstallStatus, PackageInstallValues, PackageRef,
    Prereleases, ValuesSecretRef, VersionSelection,
};
pub use template::{
    DeployStep, HelmTemplate, KappDeploy, KbldTemplate, TemplateStep, ValuesSource,
    ValuesSourceRef, YttTemplate,
};
pub use types::{AppCluster, Condition, ConditionStatus, ConditionType, KubeconfigSecretRef};

/// CRDs pkgi owns and installs on startup
pub fn owned_crds() -> Vec<CustomResourceDefinition> {
    vec![PackageInstall::crd()]
}

/// Every CRD pkgi reads or writes, for reference output
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![PackageInstall::crd(), Package::crd(), App::crd()]
}
