use crate::environment::Environment;
use crate::error::{RemoteError, RemoteResult};
use crate::share::{merge_share_scope, ShareScope, ShareScopeOverride};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Build-time input for remote generation, usually read from `rdc.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdc_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<ShareScopeOverride>,
}

impl GeneratorOptions {
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_config_api_url(mut self, url: impl Into<String>) -> Self {
        self.config_api_url = Some(url.into());
        self
    }

    pub fn with_rdc_base_url(mut self, url: impl Into<String>) -> Self {
        self.rdc_base_url = Some(url.into());
        self
    }

    pub fn with_shared(mut self, shared: ShareScopeOverride) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn from_toml_str(source: &str) -> RemoteResult<Self> {
        toml::from_str(source).map_err(|e| RemoteError::InvalidConfig {
            message: format!("Failed to parse generator options: {}", e),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| RemoteError::InvalidConfig {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn environment(&self) -> Environment {
        self.env.unwrap_or_default()
    }

    pub fn effective_config_api_url(&self) -> String {
        self.config_api_url
            .clone()
            .unwrap_or_else(|| self.environment().defaults().config_api_url.to_string())
    }

    pub fn effective_rdc_base_url(&self) -> String {
        self.rdc_base_url
            .clone()
            .unwrap_or_else(|| self.environment().defaults().rdc_base_url.to_string())
    }

    pub fn share_scope(&self) -> ShareScope {
        merge_share_scope(self.shared.as_ref())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.components.is_empty() {
            return Err("components must not be empty".to_string());
        }

        for name in &self.components {
            validate_component_name(name)?;
        }

        if let Some(url) = &self.config_api_url {
            validate_http_url("configApiUrl", url)?;
        }

        if let Some(url) = &self.rdc_base_url {
            validate_http_url("rdcBaseUrl", url)?;
        }

        Ok(())
    }
}

/// Component names double as URL path segments and global binding names.
pub fn validate_component_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("component name cannot be empty".to_string());
    }

    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '\'' | '"' | '?' | '#'))
    {
        return Err(format!(
            "component name '{}' contains invalid character {:?}",
            name, c
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err(format!("{} cannot be empty", field));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!("{} must start with http:// or https://", field));
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionClientConfig {
    /// No timeout unless a caller opts in.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for VersionClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("rdc-federation/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl VersionClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.timeout, Some(t) if t.is_zero()) {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Applied separately to the version fetch and to the script load.
    pub deadline: Option<Duration>,
    /// Concurrent first loads of one component share a single pipeline.
    pub dedupe_in_flight: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deadline: None,
            dedupe_in_flight: true,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_dedupe_in_flight(mut self, dedupe: bool) -> Self {
        self.dedupe_in_flight = dedupe;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.deadline, Some(d) if d.is_zero()) {
            return Err("Deadline must be greater than 0".to_string());
        }
        Ok(())
    }
}
