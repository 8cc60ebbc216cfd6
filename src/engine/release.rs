//! Release Channel Keys
//!
//! Defines the (product, platform, arch) channel key and the deterministic
//! object key layout shared by the catalog, resolver, and publisher.

use semver::Version;

/// Reserved suffix marking an object as a detached signature.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Identifies one update channel: a (product, platform, arch) triple.
///
/// Derived from request path segments; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseKey {
    pub product: String,
    pub platform: String,
    pub arch: String,
}

impl ReleaseKey {
    pub fn new(
        product: impl Into<String>,
        platform: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            platform: platform.into(),
            arch: arch.into(),
        }
    }

    /// Storage prefix for this channel, with trailing slash.
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}/", self.product, self.platform, self.arch)
    }

    /// Storage prefix for one version directory under this channel.
    pub fn version_prefix(&self, version: &Version) -> String {
        format!("{}{}/", self.prefix(), version)
    }

    /// Object key for one release file, named `{product}-{version}{ext}`.
    pub fn object_key(&self, version: &Version, ext: &str) -> String {
        format!(
            "{}{}-{}{}",
            self.version_prefix(version),
            self.product,
            version,
            ext
        )
    }
}

/// True when the key names a detached signature object.
pub fn is_signature_key(key: &str) -> bool {
    key.ends_with(SIGNATURE_SUFFIX)
}
