//! Desired App synthesis
//!
//! Builds the App a PackageInstall should produce from three inputs: the
//! PackageInstall itself, the selected Package, and the App currently stored
//! (if any). The result is always a fresh value; inputs are never mutated.
//!
//! Order of operations:
//! 1. Start from a copy of the stored App so fields pkgi does not own
//!    (status, labels, foreign annotations) survive.
//! 2. Stop if the stored App is marked as manually controlled.
//! 3. Replace the spec with the package template and overlay the install's
//!    control fields (service account, sync period, flags, cluster).
//! 4. Take controller ownership.
//! 5. Inject per-step fetch secrets and per-engine template inputs.

use std::collections::BTreeMap;
use std::time::Duration;

use kube::ResourceExt;
use tracing::{debug, trace};

use crate::crd::{
    App, AppSpec, FetchStep, HelmTemplate, InlineSource, LocalRef, Package, PackageInstall,
    PackageInstallSpec, TemplateStep, ValuesSource, YttTemplate,
};
use crate::packageinstall::annotations::{
    fetch_secret_name_ann_key, SecretListAnnotation, HELM_TEMPLATE_NAMESPACE_ANN_KEY,
    HELM_TEMPLATE_NAME_ANN_KEY, MANUALLY_CONTROLLED_ANN_KEY, PACKAGE_REF_NAME_ANN_KEY,
    PACKAGE_VERSION_ANN_KEY, YTT_DATA_VALUES_OVERLAYS_ANN_KEY,
};
use crate::packageinstall::owner::set_controller_reference;
use crate::{Result, DEFAULT_SYNC_PERIOD};

/// Synthesis settings supplied by the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppOptions {
    /// Sync period used when the PackageInstall does not set one
    pub default_sync_period: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            default_sync_period: DEFAULT_SYNC_PERIOD,
        }
    }
}

impl AppOptions {
    /// Override the default sync period
    pub fn default_sync_period(mut self, period: Duration) -> Self {
        self.default_sync_period = period;
        self
    }
}

/// Build the desired App for `install` at `package`'s version
///
/// Returns the stored App unchanged when it carries the manual-control
/// annotation. Fails only when controller ownership cannot be established,
/// in which case no App is produced.
pub fn desired_app(
    existing: Option<&App>,
    install: &PackageInstall,
    package: &Package,
    opts: &AppOptions,
) -> Result<App> {
    let mut desired = existing.cloned().unwrap_or_default();

    if desired.annotations().contains_key(MANUALLY_CONTROLLED_ANN_KEY) {
        debug!(
            app = %desired.name_any(),
            "App is manually controlled, leaving it untouched"
        );
        return Ok(desired);
    }

    desired.metadata.name = install.metadata.name.clone();
    desired.metadata.namespace = install.metadata.namespace.clone();

    let annotations = desired.annotations_mut();
    annotations.insert(
        PACKAGE_REF_NAME_ANN_KEY.to_string(),
        package.spec.ref_name.clone(),
    );
    annotations.insert(
        PACKAGE_VERSION_ANN_KEY.to_string(),
        package.spec.version.clone(),
    );

    desired.spec = with_install_controls(package.app_template(), &install.spec, opts);

    set_controller_reference(install, &mut desired)?;

    let install_annotations = install.annotations();

    desired.spec.fetch = std::mem::take(&mut desired.spec.fetch)
        .into_iter()
        .enumerate()
        .map(|(index, step)| attach_fetch_secret(index, step, install_annotations))
        .collect();

    desired.spec.template = TemplateInjection::from_install(install)
        .apply_all(std::mem::take(&mut desired.spec.template));

    Ok(desired)
}

/// Overlay the install-control fields of `install` onto a package template
fn with_install_controls(
    mut spec: AppSpec,
    install: &PackageInstallSpec,
    opts: &AppOptions,
) -> AppSpec {
    spec.service_account_name = install.service_account_name.clone();
    spec.sync_period = Some(install.sync_period.unwrap_or(opts.default_sync_period));
    spec.noop_delete = install.noop_delete;
    spec.paused = install.paused;
    spec.canceled = install.canceled;
    spec.cluster = install.cluster.clone();
    spec.default_namespace = install.default_namespace.clone();
    spec
}

/// Point fetch step `index` at the Secret named by its annotation, if any
fn attach_fetch_secret(
    index: usize,
    mut step: FetchStep,
    annotations: &BTreeMap<String, String>,
) -> FetchStep {
    let Some(secret) = annotations.get(&fetch_secret_name_ann_key(index)) else {
        return step;
    };

    match step.secret_ref_mut() {
        Some(slot) => *slot = Some(LocalRef::new(secret)),
        // TODO: decide whether a helm chart without a repository should report the dropped secret
        None => debug!(
            index,
            kind = step.kind(),
            secret = %secret,
            "fetch step has no secret slot, ignoring fetch secret annotation"
        ),
    }
    step
}

/// Which one-shot injections have been consumed so far
///
/// `values` is shared between engines: the first ytt or helmTemplate step in
/// document order receives the declared values and no later step does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Applied {
    values: bool,
    ytt_paths: bool,
    helm_paths: bool,
}

/// Template inputs requested by a PackageInstall, resolved once per synthesis
#[derive(Debug)]
struct TemplateInjection<'a> {
    helm_name: Option<&'a str>,
    helm_namespace: Option<&'a str>,
    helm_values_secrets: Vec<String>,
    ytt_paths_secrets: Vec<String>,
    data_values_overlays: bool,
    values_secrets: Vec<&'a str>,
}

impl<'a> TemplateInjection<'a> {
    fn from_install(install: &'a PackageInstall) -> Self {
        let annotations = install.annotations();
        Self {
            helm_name: annotations
                .get(HELM_TEMPLATE_NAME_ANN_KEY)
                .map(String::as_str),
            helm_namespace: annotations
                .get(HELM_TEMPLATE_NAMESPACE_ANN_KEY)
                .map(String::as_str),
            helm_values_secrets: SecretListAnnotation::HelmValues.secret_names(annotations),
            ytt_paths_secrets: SecretListAnnotation::YttPaths.secret_names(annotations),
            data_values_overlays: annotations.contains_key(YTT_DATA_VALUES_OVERLAYS_ANN_KEY),
            values_secrets: install.spec.values_secret_names().collect(),
        }
    }

    /// Rebuild the step list, threading the applied flags through in order
    fn apply_all(&self, steps: Vec<TemplateStep>) -> Vec<TemplateStep> {
        let capacity = steps.len();
        let (steps, applied) = steps.into_iter().fold(
            (Vec::with_capacity(capacity), Applied::default()),
            |(mut out, applied), step| {
                let (step, applied) = self.apply(step, applied);
                out.push(step);
                (out, applied)
            },
        );
        trace!(?applied, "template injection complete");
        steps
    }

    fn apply(&self, step: TemplateStep, applied: Applied) -> (TemplateStep, Applied) {
        match step {
            TemplateStep::HelmTemplate(helm) => {
                let (helm, applied) = self.helm(helm, applied);
                (TemplateStep::HelmTemplate(helm), applied)
            }
            TemplateStep::Ytt(ytt) => {
                let (ytt, applied) = self.ytt(ytt, applied);
                (TemplateStep::Ytt(ytt), applied)
            }
            step @ (TemplateStep::Kbld(_) | TemplateStep::Other(_)) => (step, applied),
        }
    }

    fn helm(&self, mut helm: HelmTemplate, applied: Applied) -> (HelmTemplate, Applied) {
        if let Some(name) = self.helm_name {
            helm.name = Some(name.to_string());
        }
        if let Some(namespace) = self.helm_namespace {
            helm.namespace = Some(namespace.to_string());
        }

        let mut next = applied;
        if !applied.helm_paths {
            next.helm_paths = true;
            helm.values_from
                .extend(self.helm_values_secrets.iter().map(ValuesSource::secret));
        }
        if !applied.values {
            next.values = true;
            helm.values_from
                .extend(self.values_secrets.iter().copied().map(ValuesSource::secret));
        }
        (helm, next)
    }

    fn ytt(&self, mut ytt: YttTemplate, applied: Applied) -> (YttTemplate, Applied) {
        let mut next = applied;
        if !applied.ytt_paths {
            next.ytt_paths = true;
            append_inline_paths(&mut ytt, self.ytt_paths_secrets.iter().map(String::as_str));
        }
        if !applied.values {
            next.values = true;
            if self.data_values_overlays {
                append_inline_paths(&mut ytt, self.values_secrets.iter().copied());
            } else {
                ytt.values_from
                    .extend(self.values_secrets.iter().copied().map(ValuesSource::secret));
            }
        }
        (ytt, next)
    }
}

/// Add Secret-sourced inline paths, creating the inline block only when needed
fn append_inline_paths<'s>(ytt: &mut YttTemplate, secrets: impl Iterator<Item = &'s str>) {
    let mut secrets = secrets.peekable();
    if secrets.peek().is_none() {
        return;
    }
    ytt.inline
        .get_or_insert_with(Default::default)
        .paths_from
        .extend(secrets.map(InlineSource::secret));
}
