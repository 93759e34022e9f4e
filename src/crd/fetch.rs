//! App fetch steps
//!
//! A fetch step names exactly one source the App controller pulls deployment
//! content from. On the wire each step is an object with a single key
//! (`inline`, `image`, `http`, `git`, `helmChart`, `imgpkgBundle`), which maps
//! directly onto an externally tagged enum. Any other shape is kept as raw
//! JSON so a Package never fails to load because of a step pkgi does not know.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a Secret in the App's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LocalRef {
    /// Secret name
    pub name: String,
}

impl LocalRef {
    /// Reference the named Secret
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One source of deployment content
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FetchStep {
    /// Content embedded in the App spec
    Inline(FetchInline),
    /// OCI image holding plain files
    Image(FetchImage),
    /// HTTP download of an archive or file
    Http(FetchHttp),
    /// Git repository
    Git(FetchGit),
    /// Helm chart, optionally from a chart repository
    HelmChart(FetchHelmChart),
    /// imgpkg bundle
    ImgpkgBundle(FetchImgpkgBundle),
    /// Any step pkgi does not model, kept verbatim
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl FetchStep {
    /// The secret slot this source kind authenticates with, if it has one
    ///
    /// Inline content has no slot. A helm chart only has one when its
    /// repository is declared.
    pub fn secret_ref_mut(&mut self) -> Option<&mut Option<LocalRef>> {
        match self {
            Self::Inline(_) | Self::Other(_) => None,
            Self::Image(image) => Some(&mut image.secret_ref),
            Self::Http(http) => Some(&mut http.secret_ref),
            Self::Git(git) => Some(&mut git.secret_ref),
            Self::HelmChart(chart) => chart.repository.as_mut().map(|r| &mut r.secret_ref),
            Self::ImgpkgBundle(bundle) => Some(&mut bundle.secret_ref),
        }
    }

    /// The secret this step currently authenticates with
    pub fn secret_ref(&self) -> Option<&LocalRef> {
        match self {
            Self::Inline(_) | Self::Other(_) => None,
            Self::Image(image) => image.secret_ref.as_ref(),
            Self::Http(http) => http.secret_ref.as_ref(),
            Self::Git(git) => git.secret_ref.as_ref(),
            Self::HelmChart(chart) => chart
                .repository
                .as_ref()
                .and_then(|r| r.secret_ref.as_ref()),
            Self::ImgpkgBundle(bundle) => bundle.secret_ref.as_ref(),
        }
    }

    /// Short name of the source kind, as it appears on the wire
    ///
    /// Steps pkgi does not model report `unknown`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inline(_) => "inline",
            Self::Image(_) => "image",
            Self::Http(_) => "http",
            Self::Git(_) => "git",
            Self::HelmChart(_) => "helmChart",
            Self::ImgpkgBundle(_) => "imgpkgBundle",
            Self::Other(_) => "unknown",
        }
    }
}

/// Inline content: literal files plus files sourced from Secrets/ConfigMaps
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchInline {
    /// File path to file content
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,

    /// Files taken from Secrets or ConfigMaps, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths_from: Vec<InlineSource>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Source of inline files
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineSource {
    /// Files from a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<InlineSourceRef>,

    /// Files from a ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<InlineSourceRef>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl InlineSource {
    /// All keys of the named Secret become files
    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            secret_ref: Some(InlineSourceRef {
                name: name.into(),
                directory_path: None,
            }),
            ..Default::default()
        }
    }
}

/// Secret or ConfigMap providing inline files
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineSourceRef {
    /// Object name
    pub name: String,

    /// Directory to place the files under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
}

/// OCI image source
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchImage {
    /// Image reference (e.g. `registry.example.com/app:v1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Registry credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalRef>,

    /// Only use this sub-directory of the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// HTTP source
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchHttp {
    /// URL to download
    pub url: String,

    /// Expected sha256 of the download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Basic auth credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalRef>,

    /// Only use this sub-directory of the archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Git source
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchGit {
    /// Repository URL
    pub url: String,

    /// Branch, tag or commit (e.g. `origin/main`)
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,

    /// SSH key or basic auth credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalRef>,

    /// Only use this sub-directory of the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    /// Skip fetching LFS objects
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub lfs_skip_smudge: bool,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Helm chart source
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchHelmChart {
    /// Chart name
    pub name: String,

    /// Chart version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Chart repository; absent means the chart name is resolvable on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<HelmChartRepository>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Helm chart repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartRepository {
    /// Repository URL
    pub url: String,

    /// Repository credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalRef>,
}

/// imgpkg bundle source
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchImgpkgBundle {
    /// Bundle image reference
    pub image: String,

    /// Registry credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalRef>,

    /// Fields pkgi does not interpret, carried through unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_parse_from_single_key_objects() {
        let yaml = r#"
- inline:
    paths:
      config.yml: "a: 1"
- git:
    url: https://github.com/example/repo
    ref: origin/main
- helmChart:
    name: nginx
    repository:
      url: https://charts.example.com
- imgpkgBundle:
    image: registry.example.com/bundle:v1
"#;
        let steps: Vec<FetchStep> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].kind(), "inline");
        match &steps[1] {
            FetchStep::Git(git) => assert_eq!(git.ref_.as_deref(), Some("origin/main")),
            other => panic!("expected git step, got {}", other.kind()),
        }
        assert_eq!(steps[2].kind(), "helmChart");
        assert_eq!(steps[3].kind(), "imgpkgBundle");
    }

    #[test]
    fn helm_chart_kind_serializes_camel_case() {
        let step = FetchStep::HelmChart(FetchHelmChart {
            name: "nginx".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["helmChart"]["name"], "nginx");
    }

    #[test]
    fn extra_fields_and_unknown_kinds_survive() {
        let json = serde_json::json!([
            { "imgpkgBundle": { "image": "r/b:1", "tagSelection": { "semver": {} } } },
            { "hg": { "url": "https://hg.example.com/repo" } }
        ]);
        let steps: Vec<FetchStep> = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(steps[0].kind(), "imgpkgBundle");
        assert_eq!(steps[1].kind(), "unknown");
        assert_eq!(serde_json::to_value(&steps).unwrap(), json);
    }

    mod secret_slot {
        use super::*;

        #[test]
        fn inline_has_no_slot() {
            let mut step = FetchStep::Inline(FetchInline::default());
            assert!(step.secret_ref_mut().is_none());

            let mut unknown = FetchStep::Other(serde_json::json!({ "hg": {} }));
            assert!(unknown.secret_ref_mut().is_none());
        }

        #[test]
        fn helm_chart_slot_requires_repository() {
            let mut bare = FetchStep::HelmChart(FetchHelmChart {
                name: "nginx".to_string(),
                ..Default::default()
            });
            assert!(bare.secret_ref_mut().is_none());

            let mut with_repo = FetchStep::HelmChart(FetchHelmChart {
                name: "nginx".to_string(),
                repository: Some(HelmChartRepository {
                    url: "https://charts.example.com".to_string(),
                    secret_ref: None,
                }),
                ..Default::default()
            });
            let slot = with_repo.secret_ref_mut().unwrap();
            *slot = Some(LocalRef::new("repo-creds"));
            assert_eq!(with_repo.secret_ref().unwrap().name, "repo-creds");
        }

        #[test]
        fn sourced_kinds_expose_their_slot() {
            let mut steps = vec![
                FetchStep::Image(FetchImage::default()),
                FetchStep::Http(FetchHttp::default()),
                FetchStep::Git(FetchGit::default()),
                FetchStep::ImgpkgBundle(FetchImgpkgBundle::default()),
            ];
            for step in &mut steps {
                *step.secret_ref_mut().unwrap() = Some(LocalRef::new("creds"));
                assert_eq!(step.secret_ref().unwrap().name, "creds");
            }
        }
    }
}
