//! App Custom Resource Definition
//!
//! An App describes how to fetch, template and deploy a set of Kubernetes
//! resources. pkgi writes Apps on behalf of PackageInstalls; a separate App
//! controller acts on them and reports progress in `status`.

use std::time::Duration;

use kube::CustomResource;
use schemars::gen::SchemaGenerator;
use schemars::schema::{ArrayValidation, InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::fetch::FetchStep;
use super::template::{DeployStep, TemplateStep};
use super::types::{AppCluster, Condition, ConditionType};

/// Specification for an App
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kappctrl.k14s.io",
    version = "v1alpha1",
    kind = "App",
    plural = "apps",
    namespaced,
    status = "AppStatus",
    derive = "PartialEq",
    derive = "Default",
    printcolumn = r#"{"name":"Description","type":"string","jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Service account used to deploy into the App's cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Target cluster, when deploying outside the App's own cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<AppCluster>,

    /// Default namespace for deployed resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,

    /// Content sources, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "pass_through_steps")]
    pub fetch: Vec<FetchStep>,

    /// Templating stages, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "pass_through_steps")]
    pub template: Vec<TemplateStep>,

    /// Deploy stages, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "pass_through_steps")]
    pub deploy: Vec<DeployStep>,

    /// Stop reconciling without deleting deployed resources
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused: bool,

    /// Cancel the in-flight reconcile and stop reconciling
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub canceled: bool,

    /// How often to re-reconcile
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    #[schemars(with = "Option<String>")]
    pub sync_period: Option<Duration>,

    /// Leave deployed resources behind when the App is deleted
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub noop_delete: bool,
}

/// Step lists are owned by the App controller; the API server keeps every
/// field of every entry
fn pass_through_steps(_: &mut SchemaGenerator) -> Schema {
    let step = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        extensions: [(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            serde_json::Value::Bool(true),
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    };
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        array: Some(Box::new(ArrayValidation {
            items: Some(Schema::Object(step).into()),
            ..Default::default()
        })),
        ..Default::default()
    })
}

/// Status for an App, written by the App controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    /// Generation last acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Reconcile conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// One-line summary of the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_description: Option<String>,

    /// Error detail from the last failed stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_error_message: Option<String>,

    /// Successful reconciles in a row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_reconcile_successes: Option<i32>,

    /// Failed reconciles in a row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_reconcile_failures: Option<i32>,
}

impl AppStatus {
    /// Whether the status has a true condition of the given type
    pub fn has_condition(&self, type_: ConditionType) -> bool {
        self.conditions.iter().any(|c| c.is_true(type_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::fetch::FetchGit;

    #[test]
    fn sync_period_uses_duration_strings() {
        let spec: AppSpec = serde_yaml::from_str("syncPeriod: 5m\n").unwrap();
        assert_eq!(spec.sync_period, Some(Duration::from_secs(300)));

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["syncPeriod"], "5m");
    }

    #[test]
    fn false_flags_and_empty_lists_are_omitted() {
        let json = serde_json::to_value(AppSpec::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn app_spec_parses_full_pipeline() {
        let yaml = r#"
serviceAccountName: installer
fetch:
  - git:
      url: https://github.com/example/app
template:
  - ytt: {}
deploy:
  - kapp: {}
paused: true
"#;
        let spec: AppSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.service_account_name.as_deref(), Some("installer"));
        assert_eq!(
            spec.fetch,
            vec![FetchStep::Git(FetchGit {
                url: "https://github.com/example/app".to_string(),
                ..Default::default()
            })]
        );
        assert_eq!(spec.template.len(), 1);
        assert_eq!(spec.deploy.len(), 1);
        assert!(spec.paused);
        assert!(!spec.canceled);
    }

    #[test]
    fn step_lists_preserve_unknown_fields_in_schema() {
        use kube::CustomResourceExt;

        let crd = serde_json::to_value(App::crd()).unwrap();
        let spec = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"];
        for list in ["fetch", "template", "deploy"] {
            let items = &spec["properties"][list]["items"];
            assert_eq!(items["type"], "object", "{list}");
            assert_eq!(items["x-kubernetes-preserve-unknown-fields"], true, "{list}");
        }
    }

    #[test]
    fn status_condition_lookup() {
        let status = AppStatus {
            conditions: vec![Condition::new(
                ConditionType::ReconcileSucceeded,
                crate::crd::ConditionStatus::True,
            )],
            ..Default::default()
        };
        assert!(status.has_condition(ConditionType::ReconcileSucceeded));
        assert!(!status.has_condition(ConditionType::ReconcileFailed));
    }
}
