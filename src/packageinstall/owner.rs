//! Controller ownership between a PackageInstall and its App
//!
//! Follows the Kubernetes controller reference rules: an object has at most
//! one controlling owner, that owner must be addressable (name + uid), and a
//! namespaced owner can only own objects in its own namespace.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::{Error, Result};

/// Make `owner` the controlling owner of `object`
///
/// An existing reference to the same owner is replaced, other non-controlling
/// references are left alone. Fails with [`Error::Configuration`] when the
/// owner cannot be referenced or another controller already owns `object`.
pub fn set_controller_reference<O, K>(owner: &O, object: &mut K) -> Result<()>
where
    O: Resource<DynamicType = ()>,
    K: Resource<DynamicType = ()>,
{
    let owner_ref = owner
        .controller_owner_ref(&())
        .map(|r| OwnerReference {
            block_owner_deletion: Some(true),
            ..r
        })
        .ok_or_else(|| {
            Error::configuration(format!(
                "{} '{}' has no name or uid and cannot own a {}",
                O::kind(&()),
                owner.meta().name.as_deref().unwrap_or_default(),
                K::kind(&()),
            ))
        })?;

    if let Some(owner_ns) = owner.meta().namespace.as_deref() {
        let object_ns = object.meta().namespace.as_deref();
        if object_ns != Some(owner_ns) {
            return Err(Error::configuration(format!(
                "cross-namespace owner references are disallowed: {} {}/{} cannot own {} in namespace '{}'",
                O::kind(&()),
                owner_ns,
                owner_ref.name,
                K::kind(&()),
                object_ns.unwrap_or_default(),
            )));
        }
    }

    let refs = object
        .meta_mut()
        .owner_references
        .get_or_insert_with(Vec::new);

    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && !same_owner(r, &owner_ref))
    {
        return Err(Error::configuration(format!(
            "{} is already controlled by {} '{}'",
            K::kind(&()),
            other.kind,
            other.name,
        )));
    }

    match refs.iter_mut().find(|r| same_owner(r, &owner_ref)) {
        Some(existing) => *existing = owner_ref,
        None => refs.push(owner_ref),
    }
    Ok(())
}

/// Same group, kind and name; API versions within a group are interchangeable
fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    api_group(&a.api_version) == api_group(&b.api_version) && a.kind == b.kind && a.name == b.name
}

fn api_group(api_version: &str) -> &str {
    api_version
        .split_once('/')
        .map(|(group, _)| group)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{App, AppSpec, PackageInstall, PackageInstallSpec};

    fn install(name: &str, namespace: &str, uid: Option<&str>) -> PackageInstall {
        let mut install = PackageInstall::new(name, PackageInstallSpec::default());
        install.metadata.namespace = Some(namespace.to_string());
        install.metadata.uid = uid.map(str::to_string);
        install
    }

    fn app(name: &str, namespace: &str) -> App {
        let mut app = App::new(name, AppSpec::default());
        app.metadata.namespace = Some(namespace.to_string());
        app
    }

    #[test]
    fn adds_controller_reference() {
        let owner = install("nginx", "apps", Some("uid-1"));
        let mut owned = app("nginx", "apps");

        set_controller_reference(&owner, &mut owned).unwrap();

        let refs = owned.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].api_version, "packaging.carvel.dev/v1alpha1");
        assert_eq!(refs[0].kind, "PackageInstall");
        assert_eq!(refs[0].name, "nginx");
        assert_eq!(refs[0].uid, "uid-1");
        assert_eq!(refs[0].controller, Some(true));
        assert_eq!(refs[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn repeated_calls_keep_a_single_reference() {
        let owner = install("nginx", "apps", Some("uid-1"));
        let mut owned = app("nginx", "apps");

        set_controller_reference(&owner, &mut owned).unwrap();
        set_controller_reference(&owner, &mut owned).unwrap();

        assert_eq!(owned.metadata.owner_references.unwrap().len(), 1);
    }

    #[test]
    fn recreated_owner_replaces_stale_uid() {
        let mut owned = app("nginx", "apps");
        set_controller_reference(&install("nginx", "apps", Some("old")), &mut owned).unwrap();
        set_controller_reference(&install("nginx", "apps", Some("new")), &mut owned).unwrap();

        let refs = owned.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uid, "new");
    }

    #[test]
    fn keeps_unrelated_non_controller_references() {
        let mut owned = app("nginx", "apps");
        owned.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            name: "anchor".to_string(),
            uid: "cm-uid".to_string(),
            controller: None,
            block_owner_deletion: None,
        }]);

        set_controller_reference(&install("nginx", "apps", Some("uid-1")), &mut owned).unwrap();

        let refs = owned.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, "ConfigMap");
        assert_eq!(refs[1].kind, "PackageInstall");
    }

    #[test]
    fn owner_without_uid_is_a_configuration_error() {
        let owner = install("nginx", "apps", None);
        let mut owned = app("nginx", "apps");

        let err = set_controller_reference(&owner, &mut owned).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("no name or uid"));
    }

    #[test]
    fn cross_namespace_is_a_configuration_error() {
        let owner = install("nginx", "apps", Some("uid-1"));
        let mut owned = app("nginx", "other");

        let err = set_controller_reference(&owner, &mut owned).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("cross-namespace"));
    }

    #[test]
    fn foreign_controller_is_a_configuration_error() {
        let mut owned = app("nginx", "apps");
        owned.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "nginx".to_string(),
            uid: "deploy-uid".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]);

        let err = set_controller_reference(&install("nginx", "apps", Some("uid-1")), &mut owned)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("already controlled by Deployment 'nginx'"));
    }

    #[test]
    fn groups_ignore_version() {
        assert_eq!(api_group("packaging.carvel.dev/v1alpha1"), "packaging.carvel.dev");
        assert_eq!(api_group("v1"), "");
    }
}
