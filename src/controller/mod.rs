//! Controller for PackageInstall resources
//!
//! Watches PackageInstalls (and the Apps they own) and keeps each App in
//! line with the selected Package and the install's overrides.

mod package_install;

pub use package_install::{
    error_policy, failed_status, reconcile, status_from_app, Context, ContextBuilder, KubeClient,
    KubeClientImpl,
};
