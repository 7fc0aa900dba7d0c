//! Shared dependency negotiation.
//!
//! The share scope lists packages that must be instantiated exactly once and
//! reused by the host and every remote. Callers supply partial overrides
//! which are merged field by field over the built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ANY_VERSION: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDependency {
    pub singleton: bool,
    pub required_version: String,
    pub eager: bool,
}

impl SharedDependency {
    pub fn singleton() -> Self {
        Self {
            singleton: true,
            ..Self::default()
        }
    }

    pub fn with_required_version(mut self, version: impl Into<String>) -> Self {
        self.required_version = version.into();
        self
    }

    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    fn apply(&mut self, patch: &SharedOverride) {
        if let Some(singleton) = patch.singleton {
            self.singleton = singleton;
        }
        if let Some(version) = &patch.required_version {
            self.required_version = version.clone();
        }
        if let Some(eager) = patch.eager {
            self.eager = eager;
        }
    }
}

impl Default for SharedDependency {
    fn default() -> Self {
        Self {
            singleton: false,
            required_version: ANY_VERSION.to_string(),
            eager: false,
        }
    }
}

/// A partial [`SharedDependency`]; absent fields keep the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singleton: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eager: Option<bool>,
}

pub type ShareScopeOverride = BTreeMap<String, SharedOverride>;

/// Package name to sharing policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareScope(BTreeMap<String, SharedDependency>);

impl ShareScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: impl Into<String>, dependency: SharedDependency) {
        self.0.insert(package.into(), dependency);
    }

    pub fn get(&self, package: &str) -> Option<&SharedDependency> {
        self.0.get(package)
    }

    pub fn contains(&self, package: &str) -> bool {
        self.0.contains_key(package)
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies `patch` in place. Packages unknown to the scope are added
    /// with the unspecified fields taken from [`SharedDependency::default`].
    pub fn apply(&mut self, patch: &ShareScopeOverride) {
        for (package, fields) in patch {
            self.0.entry(package.clone()).or_default().apply(fields);
        }
    }
}

/// The UI framework and its DOM binding, both singletons.
pub fn default_share_scope() -> ShareScope {
    let mut scope = ShareScope::new();
    scope.insert("react", SharedDependency::singleton());
    scope.insert("react-dom", SharedDependency::singleton());
    scope
}

pub fn merge_share_scope(custom: Option<&ShareScopeOverride>) -> ShareScope {
    let mut scope = default_share_scope();
    if let Some(patch) = custom {
        scope.apply(patch);
    }
    scope
}
