//! Remote entry URL convention.
//!
//! Every published component lives at
//! `{rdc_base_url}/qa-rdc-{component}/webpack/{version}/remoteEntry.js`.
//! The `webpack` segment names the deploy target and stays fixed regardless
//! of which bundler consumes the remote.

pub const COMPONENT_DIR_PREFIX: &str = "qa-rdc-";
pub const DEPLOY_TARGET_SEGMENT: &str = "webpack";
pub const REMOTE_ENTRY_FILE: &str = "remoteEntry.js";

/// Everything before the version segment, trailing slash included.
pub fn remote_entry_prefix(rdc_base_url: &str, component: &str) -> String {
    format!(
        "{}/{}{}/{}/",
        rdc_base_url, COMPONENT_DIR_PREFIX, component, DEPLOY_TARGET_SEGMENT
    )
}

/// Absolute URL of a component's entry script.
///
/// Callers must have rejected an empty version before getting here.
pub fn remote_entry_url(rdc_base_url: &str, component: &str, version: &str) -> String {
    debug_assert!(!version.is_empty(), "remote entry version must be resolved");
    format!(
        "{}{}/{}",
        remote_entry_prefix(rdc_base_url, component),
        version,
        REMOTE_ENTRY_FILE
    )
}
