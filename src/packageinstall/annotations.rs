//! Annotation surface of PackageInstall and App
//!
//! Secret lists are spread over several annotations sharing a base key:
//! `<base>` and `<base>.<suffix>`. They are read back in suffix order so the
//! result depends only on the annotation keys, never on map iteration order.

use std::collections::BTreeMap;

/// On an existing App: stop pkgi from changing it
pub const MANUALLY_CONTROLLED_ANN_KEY: &str = "ext.packaging.carvel.dev/manually-controlled";

/// Release name override for helmTemplate steps
pub const HELM_TEMPLATE_NAME_ANN_KEY: &str = "ext.packaging.carvel.dev/helm-template-name";

/// Release namespace override for helmTemplate steps
pub const HELM_TEMPLATE_NAMESPACE_ANN_KEY: &str = "ext.packaging.carvel.dev/helm-template-namespace";

/// Base key of the Secrets added to the first ytt step's inline paths
pub const YTT_PATHS_FROM_SECRET_NAME_ANN_KEY: &str =
    "ext.packaging.carvel.dev/ytt-paths-from-secret-name";

/// Base key of the Secrets added to the first helmTemplate step's values
pub const HELM_VALUES_FROM_SECRET_NAME_ANN_KEY: &str =
    "ext.packaging.carvel.dev/helm-template-values-from-secret-name";

/// Declared values become ytt inline paths (overlays) instead of data values
pub const YTT_DATA_VALUES_OVERLAYS_ANN_KEY: &str = "ext.packaging.carvel.dev/ytt-data-values-overlays";

/// Written on the App: reference name of the installed package
pub const PACKAGE_REF_NAME_ANN_KEY: &str = "packaging.carvel.dev/package-ref-name";

/// Written on the App: version of the installed package
pub const PACKAGE_VERSION_ANN_KEY: &str = "packaging.carvel.dev/package-version";

/// Annotation naming the Secret for the fetch step at `index`
pub fn fetch_secret_name_ann_key(index: usize) -> String {
    format!("ext.packaging.carvel.dev/fetch-{}-secret-name", index)
}

/// Annotation families that carry an ordered list of Secret names
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretListAnnotation {
    /// Inline paths for the first ytt step
    YttPaths,
    /// Values for the first helmTemplate step
    HelmValues,
}

impl SecretListAnnotation {
    /// Base annotation key of this family
    pub fn base_key(self) -> &'static str {
        match self {
            Self::YttPaths => YTT_PATHS_FROM_SECRET_NAME_ANN_KEY,
            Self::HelmValues => HELM_VALUES_FROM_SECRET_NAME_ANN_KEY,
        }
    }

    /// Secret names of this family in suffix order
    pub fn secret_names(self, annotations: &BTreeMap<String, String>) -> Vec<String> {
        resolve_ordered_secrets(annotations, self.base_key())
    }
}

/// Position of an annotation within a secret list
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnnotationSuffix<'a> {
    /// The bare base key; sorts before every suffixed key
    Base,
    /// `<base>.<suffix>`
    Suffixed(&'a str),
}

impl<'a> AnnotationSuffix<'a> {
    /// Parse `key` as a member of the list rooted at `base_key`
    ///
    /// Only the first `.` after the base key delimits; the suffix may contain
    /// further dots. `<base>.` with nothing after the dot is not a member.
    pub fn parse(key: &'a str, base_key: &str) -> Option<Self> {
        let rest = key.strip_prefix(base_key)?;
        if rest.is_empty() {
            return Some(Self::Base);
        }
        match rest.strip_prefix('.') {
            Some(suffix) if !suffix.is_empty() => Some(Self::Suffixed(suffix)),
            _ => None,
        }
    }
}

/// Secret names listed under `base_key`, ordered by suffix
pub fn resolve_ordered_secrets(
    annotations: &BTreeMap<String, String>,
    base_key: &str,
) -> Vec<String> {
    let by_suffix: BTreeMap<AnnotationSuffix<'_>, &String> = annotations
        .iter()
        .filter_map(|(key, secret)| {
            AnnotationSuffix::parse(key, base_key).map(|suffix| (suffix, secret))
        })
        .collect();

    by_suffix.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anns(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    mod suffix_parsing {
        use super::*;

        const BASE: &str = "ext.packaging.carvel.dev/ytt-paths-from-secret-name";

        #[test]
        fn base_key_is_empty_suffix() {
            let suffix = AnnotationSuffix::parse(BASE, BASE).unwrap();
            assert_eq!(suffix, AnnotationSuffix::Base);
        }

        #[test]
        fn only_first_dot_delimits() {
            let key = format!("{}.a.b.c", BASE);
            assert_eq!(
                AnnotationSuffix::parse(&key, BASE),
                Some(AnnotationSuffix::Suffixed("a.b.c"))
            );
        }

        #[test]
        fn near_misses_do_not_match() {
            assert_eq!(AnnotationSuffix::parse(&format!("{}.", BASE), BASE), None);
            assert_eq!(AnnotationSuffix::parse(&format!("{}x", BASE), BASE), None);
            assert_eq!(AnnotationSuffix::parse(&format!("{}-1", BASE), BASE), None);
            assert_eq!(AnnotationSuffix::parse("unrelated", BASE), None);
        }

        #[test]
        fn base_sorts_before_any_suffix() {
            assert!(AnnotationSuffix::Base < AnnotationSuffix::Suffixed(""));
            assert!(AnnotationSuffix::Base < AnnotationSuffix::Suffixed("0"));
            assert!(AnnotationSuffix::Suffixed("a") < AnnotationSuffix::Suffixed("b"));
        }
    }

    mod ordered_secrets {
        use super::*;

        #[test]
        fn orders_by_suffix_not_insertion() {
            let annotations = anns(&[("K", "s0"), ("K.b", "s2"), ("K.a", "s1")]);
            assert_eq!(
                resolve_ordered_secrets(&annotations, "K"),
                vec!["s0", "s1", "s2"]
            );
        }

        #[test]
        fn suffix_order_is_lexicographic() {
            let annotations = anns(&[("K.10", "ten"), ("K.2", "two"), ("K.1", "one")]);
            assert_eq!(
                resolve_ordered_secrets(&annotations, "K"),
                vec!["one", "ten", "two"]
            );
        }

        #[test]
        fn no_match_is_empty() {
            let annotations = anns(&[("other", "x"), ("Kx", "y")]);
            assert!(resolve_ordered_secrets(&annotations, "K").is_empty());
            assert!(resolve_ordered_secrets(&BTreeMap::new(), "K").is_empty());
        }

        #[test]
        fn ignores_keys_of_other_families() {
            let extra = format!("{}.extra", HELM_VALUES_FROM_SECRET_NAME_ANN_KEY);
            let annotations = anns(&[
                (YTT_PATHS_FROM_SECRET_NAME_ANN_KEY, "ytt"),
                (HELM_VALUES_FROM_SECRET_NAME_ANN_KEY, "helm"),
                (extra.as_str(), "helm-extra"),
            ]);
            assert_eq!(
                SecretListAnnotation::YttPaths.secret_names(&annotations),
                vec!["ytt"]
            );
            assert_eq!(
                SecretListAnnotation::HelmValues.secret_names(&annotations),
                vec!["helm", "helm-extra"]
            );
        }
    }

    #[test]
    fn families_read_their_own_base_key() {
        let annotations = anns(&[
            (YTT_PATHS_FROM_SECRET_NAME_ANN_KEY, "ytt"),
            (HELM_VALUES_FROM_SECRET_NAME_ANN_KEY, "helm"),
        ]);
        assert_eq!(SecretListAnnotation::YttPaths.secret_names(&annotations), vec!["ytt"]);
        assert_eq!(SecretListAnnotation::HelmValues.secret_names(&annotations), vec!["helm"]);
    }

    #[test]
    fn fetch_secret_key_embeds_index() {
        assert_eq!(
            fetch_secret_name_ann_key(2),
            "ext.packaging.carvel.dev/fetch-2-secret-name"
        );
    }
}
