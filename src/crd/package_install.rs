//! PackageInstall Custom Resource Definition
//!
//! A PackageInstall is the user-facing request "install this package, with
//! these overrides". pkgi turns each one into an App.

use std::time::Duration;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{AppCluster, Condition};

/// Specification for a PackageInstall
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "packaging.carvel.dev",
    version = "v1alpha1",
    kind = "PackageInstall",
    plural = "packageinstalls",
    shortname = "pkgi",
    namespaced,
    status = "PackageInstallStatus",
    derive = "PartialEq",
    derive = "Default",
    printcolumn = r#"{"name":"Package name","type":"string","jsonPath":".spec.packageRef.refName"}"#,
    printcolumn = r#"{"name":"Package version","type":"string","jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Description","type":"string","jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PackageInstallSpec {
    /// Service account the resulting App deploys with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Target cluster, when installing outside this cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<AppCluster>,

    /// Package to install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_ref: Option<PackageRef>,

    /// Values Secrets passed to the package's templating steps, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<PackageInstallValues>,

    /// Stop reconciling the App without deleting deployed resources
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused: bool,

    /// Cancel the App's in-flight reconcile
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub canceled: bool,

    /// How often to re-reconcile; the controller default applies when unset
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    #[schemars(with = "Option<String>")]
    pub sync_period: Option<Duration>,

    /// Leave deployed resources behind when the install is deleted
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub noop_delete: bool,

    /// Default namespace for deployed resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
}

/// Which package, and which versions of it, to install
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageRef {
    /// Package reference name (e.g. `cert-manager.example.com`)
    pub ref_name: String,

    /// Version constraints; absent means any released version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_selection: Option<VersionSelection>,
}

/// Semver selection of a package version
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionSelection {
    /// Exact version (`1.2.3`) or comma-separated requirements (`>=1.2.0, <2.0.0`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,

    /// Allow prerelease versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prereleases: Option<Prereleases>,
}

/// Prerelease policy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prereleases {
    /// Only allow prereleases whose first identifier is listed (all when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

/// One values source for the package
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageInstallValues {
    /// Secret holding the values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ValuesSecretRef>,
}

impl PackageInstallValues {
    /// Values from the named Secret
    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            secret_ref: Some(ValuesSecretRef {
                name: name.into(),
                key: None,
            }),
        }
    }
}

/// Secret holding package values
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValuesSecretRef {
    /// Secret name
    pub name: String,

    /// Key within the Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl PackageInstallSpec {
    /// Names of the Secrets declared as values sources, in declaration order
    pub fn values_secret_names(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter_map(|v| v.secret_ref.as_ref())
            .map(|r| r.name.as_str())
    }
}

/// Status for a PackageInstall
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageInstallStatus {
    /// Generation last acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Reconcile conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// One-line summary of the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_description: Option<String>,

    /// Error detail from the last failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_error_message: Option<String>,

    /// Version that was installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Version most recently selected for installation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempted_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn parses_install_manifest() {
        let yaml = r#"
apiVersion: packaging.carvel.dev/v1alpha1
kind: PackageInstall
metadata:
  name: cert-manager
  namespace: tools
  annotations:
    ext.packaging.carvel.dev/fetch-0-secret-name: registry-creds
spec:
  serviceAccountName: installer
  packageRef:
    refName: cert-manager.example.com
    versionSelection:
      constraints: ">=1.2.0"
  values:
    - secretRef:
        name: cert-manager-values
  syncPeriod: 30m
"#;
        let install: PackageInstall = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(install.metadata.name.as_deref(), Some("cert-manager"));
        let package_ref = install.spec.package_ref.as_ref().unwrap();
        assert_eq!(package_ref.ref_name, "cert-manager.example.com");
        assert_eq!(
            package_ref
                .version_selection
                .as_ref()
                .and_then(|v| v.constraints.as_deref()),
            Some(">=1.2.0")
        );
        assert_eq!(install.spec.sync_period, Some(Duration::from_secs(1800)));
        assert_eq!(
            install.spec.values_secret_names().collect::<Vec<_>>(),
            vec!["cert-manager-values"]
        );
    }

    #[test]
    fn values_without_secret_are_skipped() {
        let spec = PackageInstallSpec {
            values: vec![
                PackageInstallValues::secret("first"),
                PackageInstallValues::default(),
                PackageInstallValues::secret("second"),
            ],
            ..Default::default()
        };
        assert_eq!(
            spec.values_secret_names().collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }

    #[test]
    fn crd_has_expected_names() {
        let crd = PackageInstall::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("packageinstalls.packaging.carvel.dev")
        );
        assert_eq!(crd.spec.group, "packaging.carvel.dev");
        assert_eq!(crd.spec.names.kind, "PackageInstall");
        assert_eq!(crd.spec.scope, "Namespaced");
    }
}
