use const_format::concatcp;

/// The Armada-specific general key prefix.
const ARMADA_KEY_PREFIX: &str = "gitops.armada.dev/";

/// The wrangler-compatible objectset key prefix. Resources stamped with keys
/// under this prefix are considered managed by a bundle deployment.
pub const OBJECTSET_KEY_PREFIX: &str = "objectset.rio.cattle.io/";

/// The Helm release metadata key prefix.
pub const HELM_KEY_PREFIX: &str = "meta.helm.sh/";

/// Label carrying the name of the downstream cluster a bundle deployment
/// belongs to.
pub const CLUSTER_LABEL: &str = concatcp!(ARMADA_KEY_PREFIX, "cluster");

/// Label carrying the name of the source repository a bundle was built from.
pub const REPO_LABEL: &str = concatcp!(ARMADA_KEY_PREFIX, "repo-name");

/// Label carrying the commit a bundle was built from.
pub const COMMIT_LABEL: &str = concatcp!(ARMADA_KEY_PREFIX, "commit");

/// Label carrying the name of the bundle a bundle deployment was created for.
pub const BUNDLE_LABEL: &str = concatcp!(ARMADA_KEY_PREFIX, "bundle-name");

/// Label carrying the namespace of the bundle a bundle deployment was created
/// for.
pub const BUNDLE_NAMESPACE_LABEL: &str = concatcp!(ARMADA_KEY_PREFIX, "bundle-namespace");

/// Label holding the hash of the objectset a managed resource was applied
/// from, one of the two parts of the ownership stamp.
pub const OBJECTSET_HASH_LABEL: &str = concatcp!(OBJECTSET_KEY_PREFIX, "hash");

/// Annotation holding the objectset id of the owning bundle deployment, the
/// second part of the ownership stamp.
pub const OBJECTSET_ID_ANNOTATION: &str = concatcp!(OBJECTSET_KEY_PREFIX, "id");

/// The well-known Kubernetes managed-by key `app.kubernetes.io/managed-by`.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// The managed-by value written on resources owned by a bundle deployment.
/// Helm-compatible so adopted resources keep working with Helm tooling.
pub const MANAGED_BY_HELM: &str = "Helm";

/// Annotation naming the Helm release a managed resource belongs to.
pub const HELM_RELEASE_NAME_ANNOTATION: &str = concatcp!(HELM_KEY_PREFIX, "release-name");

/// Annotation naming the namespace of the Helm release a managed resource
/// belongs to.
pub const HELM_RELEASE_NAMESPACE_ANNOTATION: &str = concatcp!(HELM_KEY_PREFIX, "release-namespace");
