//! PackageInstall to App synthesis
//!
//! - [`annotations`] - annotation keys and ordered secret lists
//! - [`app`] - builds the desired App from a PackageInstall and Package
//! - [`owner`] - controller ownership of the App
//! - [`version`] - selects the Package version to install

pub mod annotations;
pub mod app;
pub mod owner;
pub mod version;

pub use annotations::{resolve_ordered_secrets, SecretListAnnotation};
pub use app::{desired_app, AppOptions};
pub use owner::set_controller_reference;
pub use version::{merge_package_sources, select_package, VersionConstraint};
