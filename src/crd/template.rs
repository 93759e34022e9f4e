//! App template and deploy steps
//!
//! Step kinds pkgi injects into (ytt, helmTemplate) and the ones it merely
//! recognises are modelled; everything else (sops, cue, kustomize, ...)
//! passes through as raw JSON.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::fetch::FetchInline;

/// One content-transformation stage run before deploy
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TemplateStep {
    /// Overlay templating with ytt
    Ytt(YttTemplate),
    /// Image reference resolution with kbld
    Kbld(KbldTemplate),
    /// Chart templating with `helm template`
    HelmTemplate(HelmTemplate),
    /// Any other templating engine, kept verbatim
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// ytt templating options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YttTemplate {
    /// Ignore comments that ytt does not recognise
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_unknown_comments: bool,

    /// Run ytt in strict YAML mode
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strict: bool,

    /// Extra files supplied alongside the fetched content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<FetchInline>,

    /// Paths within the fetched content to template
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// File marks passed through to ytt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_marks: Vec<String>,

    /// Data values sources, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesSource>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// kbld options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KbldTemplate {
    /// Paths within the templated content to resolve
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `helm template` options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmTemplate {
    /// Release name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Release namespace override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Chart path within the fetched content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Values sources, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesSource>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Source of template values
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValuesSource {
    /// Values from a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ValuesSourceRef>,

    /// Values from a ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ValuesSourceRef>,

    /// Values file within the fetched content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ValuesSource {
    /// Values taken from the named Secret
    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            secret_ref: Some(ValuesSourceRef { name: name.into() }),
            ..Default::default()
        }
    }
}

/// Secret or ConfigMap providing values
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ValuesSourceRef {
    /// Object name
    pub name: String,
}

/// One deploy stage
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum DeployStep {
    /// Deploy with kapp
    Kapp(KappDeploy),
    /// Any other deployer, kept verbatim
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// kapp deploy options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KappDeploy {
    /// Override namespace for all namespaced resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into_ns: Option<String>,

    /// Namespace mappings (`old:new`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map_ns: Vec<String>,

    /// Extra kapp flags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_options: Vec<String>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
