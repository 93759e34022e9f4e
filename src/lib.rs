//! pkgi - PackageInstall controller for Carvel-style packaging
//!
//! A PackageInstall names a Package (by reference name and version
//! constraints) plus a few install-time overrides. This crate turns that
//! request into the App resource that actually fetches, templates and
//! deploys the package.
//!
//! # Architecture
//!
//! - Synthesis is a pure function: existing App + PackageInstall + Package
//!   in, desired App out. It never talks to the API server.
//! - The controller selects the Package version, writes the App when it
//!   differs from the stored one, and mirrors App progress into the
//!   PackageInstall status.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (PackageInstall, Package, App)
//! - [`packageinstall`] - App synthesis, annotation handling, version selection
//! - [`controller`] - Kubernetes controller reconciliation logic
//! - [`error`] - Error types for the controller

#![deny(missing_docs)]

use std::time::Duration;

pub mod controller;
pub mod crd;
pub mod error;
pub mod packageinstall;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Sync period for PackageInstalls that do not set one
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Delay before a failed reconcile is retried
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(30);
