//! Package version selection
//!
//! Picks the highest Package version that satisfies a PackageInstall's
//! reference name and version selection.

use std::collections::BTreeSet;

use semver::{Prerelease, Version, VersionReq};
use tracing::debug;

use crate::crd::{Package, PackageRef, Prereleases};
use crate::{Error, Result};

/// Parsed `versionSelection.constraints`
#[derive(Clone, Debug, PartialEq)]
pub enum VersionConstraint {
    /// No constraint: any released version
    Any,
    /// A bare version selects exactly that version
    Exact(Version),
    /// Comparator list such as `>=1.2.0, <2.0.0`
    Range(VersionReq),
}

impl VersionConstraint {
    /// Parse a constraint string; empty or absent means [`VersionConstraint::Any`]
    pub fn parse(constraints: Option<&str>) -> Result<Self> {
        let Some(raw) = constraints.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Self::Any);
        };
        if let Ok(version) = Version::parse(raw) {
            return Ok(Self::Exact(version));
        }
        VersionReq::parse(raw)
            .map(Self::Range)
            .map_err(|e| Error::validation(format!("invalid version constraint '{}': {}", raw, e)))
    }

    fn matches(&self, version: &Version, allow_prereleases: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => version == exact,
            Self::Range(req) => {
                req.matches(version)
                    || (allow_prereleases
                        && !version.pre.is_empty()
                        && req.matches(&Version {
                            pre: Prerelease::EMPTY,
                            ..version.clone()
                        }))
            }
        }
    }
}

/// Whether a version passes the prerelease policy
fn prerelease_allowed(version: &Version, policy: Option<&Prereleases>) -> bool {
    if version.pre.is_empty() {
        return true;
    }
    match policy {
        None => false,
        Some(p) if p.identifiers.is_empty() => true,
        Some(p) => {
            let first = version.pre.as_str().split('.').next().unwrap_or_default();
            p.identifiers.iter().any(|id| id == first)
        }
    }
}

/// Select the Package to install for `package_ref`
///
/// Packages with another reference name or an unparseable version are
/// ignored. Prereleases are only eligible when the selection allows them or
/// the constraint names one exactly.
pub fn select_package<'a, I>(packages: I, package_ref: &PackageRef) -> Result<&'a Package>
where
    I: IntoIterator<Item = &'a Package>,
{
    let selection = package_ref.version_selection.as_ref();
    let raw_constraints = selection.and_then(|s| s.constraints.as_deref());
    let constraint = VersionConstraint::parse(raw_constraints)?;
    let policy = selection.and_then(|s| s.prereleases.as_ref());

    packages
        .into_iter()
        .filter(|p| p.spec.ref_name == package_ref.ref_name)
        .filter_map(|p| match Version::parse(&p.spec.version) {
            Ok(version) => Some((version, p)),
            Err(e) => {
                debug!(
                    package = %p.spec.ref_name,
                    version = %p.spec.version,
                    error = %e,
                    "skipping package with invalid version"
                );
                None
            }
        })
        .filter(|(version, _)| {
            let exact = matches!(&constraint, VersionConstraint::Exact(v) if v == version);
            exact || prerelease_allowed(version, policy)
        })
        .filter(|(version, _)| constraint.matches(version, policy.is_some()))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, p)| p)
        .ok_or_else(|| {
            Error::package_resolution(format!(
                "no Package with refName '{}' satisfies constraints '{}'",
                package_ref.ref_name,
                raw_constraints.unwrap_or("*"),
            ))
        })
}

/// Combine namespace-local and global Packages
///
/// A local Package hides a global one with the same reference name and
/// version.
pub fn merge_package_sources(local: Vec<Package>, global: Vec<Package>) -> Vec<Package> {
    let local_keys: BTreeSet<(String, String)> = local
        .iter()
        .map(|p| (p.spec.ref_name.clone(), p.spec.version.clone()))
        .collect();

    local
        .into_iter()
        .chain(global.into_iter().filter(|p| {
            !local_keys.contains(&(p.spec.ref_name.clone(), p.spec.version.clone()))
        }))
        .collect()
}
