//! Package Custom Resource Definition
//!
//! A Package is one released version of a package: its reference name, its
//! semver version, and the App template that deploys it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::app::AppSpec;

/// Specification for a Package
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "data.packaging.carvel.dev",
    version = "v1alpha1",
    kind = "Package",
    plural = "packages",
    shortname = "pkg",
    namespaced,
    derive = "PartialEq",
    derive = "Default",
    printcolumn = r#"{"name":"Package name","type":"string","jsonPath":".spec.refName"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PackageSpec {
    /// Package reference name shared by all versions
    pub ref_name: String,

    /// Semver version of this release
    pub version: String,

    /// App template deployed for this version
    #[serde(default)]
    pub template: AppTemplateSpec,

    /// Release notes for this version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

/// Wrapper around the packaged App spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppTemplateSpec {
    /// App spec to deploy; absent is treated as an empty template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<AppSpec>,
}

impl Package {
    /// The packaged deployment template, empty when the package declares none
    pub fn app_template(&self) -> AppSpec {
        self.spec.template.spec.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_with_template() {
        let yaml = r#"
apiVersion: data.packaging.carvel.dev/v1alpha1
kind: Package
metadata:
  name: cert-manager.example.com.1.2.3
  namespace: tools
spec:
  refName: cert-manager.example.com
  version: 1.2.3
  template:
    spec:
      fetch:
        - imgpkgBundle:
            image: registry.example.com/cert-manager:1.2.3
      template:
        - ytt: {}
      deploy:
        - kapp: {}
"#;
        let pkg: Package = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pkg.spec.ref_name, "cert-manager.example.com");
        assert_eq!(pkg.spec.version, "1.2.3");
        let template = pkg.app_template();
        assert_eq!(template.fetch.len(), 1);
        assert_eq!(template.template.len(), 1);
        assert_eq!(template.deploy.len(), 1);
    }

    #[test]
    fn missing_template_is_empty() {
        let pkg = Package::new(
            "empty.example.com.1.0.0",
            PackageSpec {
                ref_name: "empty.example.com".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(pkg.app_template(), AppSpec::default());
    }
}
