//! Shared types for pkgi CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Reconcile condition types shared by App and PackageInstall
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConditionType {
    /// A reconcile is in progress
    Reconciling,
    /// The last reconcile completed successfully
    ReconcileSucceeded,
    /// The last reconcile failed
    ReconcileFailed,
    /// Deletion is in progress
    Deleting,
    /// Deletion failed
    DeleteFailed,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconciling => write!(f, "Reconciling"),
            Self::ReconcileSucceeded => write!(f, "ReconcileSucceeded"),
            Self::ReconcileFailed => write!(f, "ReconcileFailed"),
            Self::Deleting => write!(f, "Deleting"),
            Self::DeleteFailed => write!(f, "DeleteFailed"),
        }
    }
}

/// Status condition as written by the App and PackageInstall controllers
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// Create a condition with no reason or message
    pub fn new(type_: ConditionType, status: ConditionStatus) -> Self {
        Self {
            type_,
            status,
            reason: None,
            message: None,
        }
    }

    /// Attach a machine-readable reason (CamelCase)
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach a human-readable message
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Whether this condition is of the given type and currently true
    pub fn is_true(&self, type_: ConditionType) -> bool {
        self.type_ == type_ && self.status == ConditionStatus::True
    }
}

/// Target cluster for an App, when it deploys somewhere other than its own cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppCluster {
    /// Namespace in the target cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Secret holding the kubeconfig for the target cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig_secret_ref: Option<KubeconfigSecretRef>,
}

/// Reference to a kubeconfig stored in a Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeconfigSecretRef {
    /// Secret name
    pub name: String,

    /// Key within the Secret (defaults to `value`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_type_serializes_as_kapp_strings() {
        let cond = Condition::new(ConditionType::ReconcileSucceeded, ConditionStatus::True);
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["type"], "ReconcileSucceeded");
        assert_eq!(json["status"], "True");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn condition_is_true_checks_type_and_status() {
        let cond = Condition::new(ConditionType::ReconcileFailed, ConditionStatus::True)
            .message("fetch failed");
        assert!(cond.is_true(ConditionType::ReconcileFailed));
        assert!(!cond.is_true(ConditionType::ReconcileSucceeded));

        let cond = Condition::new(ConditionType::ReconcileFailed, ConditionStatus::False);
        assert!(!cond.is_true(ConditionType::ReconcileFailed));
    }

    #[test]
    fn cluster_round_trips_camel_case() {
        let yaml = r#"
namespace: apps
kubeconfigSecretRef:
  name: workload-kubeconfig
  key: value
"#;
        let cluster: AppCluster = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cluster.namespace.as_deref(), Some("apps"));
        let secret = cluster.kubeconfig_secret_ref.unwrap();
        assert_eq!(secret.name, "workload-kubeconfig");
        assert_eq!(secret.key.as_deref(), Some("value"));
    }
}
