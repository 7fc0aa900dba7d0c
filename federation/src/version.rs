use crate::config::VersionClientConfig;
use crate::environment::Environment;
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Published versions: component name, then environment key, then version.
///
/// Entries are kept as raw JSON so an irregular entry only affects lookups
/// of its own component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionConfig(BTreeMap<String, Value>);

impl VersionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(
        mut self,
        component: impl Into<String>,
        env: Environment,
        version: impl Into<String>,
    ) -> Self {
        let tiers = self
            .0
            .entry(component.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if !tiers.is_object() {
            *tiers = Value::Object(Map::new());
        }
        if let Value::Object(tiers) = tiers {
            tiers.insert(env.key().to_string(), Value::String(version.into()));
        }
        self
    }

    /// The short tier key wins; the long one (`development`, `production`)
    /// is read when the short one holds nothing. Empty strings and
    /// non-string values count as unpublished.
    pub fn version_for(&self, component: &str, env: Environment) -> Option<&str> {
        let tiers = self.0.get(component)?;
        [env.key(), env.long_key()].into_iter().find_map(|key| {
            tiers
                .get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
        })
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

/// Body returned by the version lookup endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub value: Option<VersionConfig>,
    #[serde(default)]
    pub message: Option<String>,
}

impl VersionEnvelope {
    pub fn ok(value: VersionConfig) -> Self {
        Self {
            success: true,
            value: Some(value),
            message: None,
        }
    }

    /// `None` when the lookup was unsuccessful or carried no document.
    pub fn config(&self) -> Option<&VersionConfig> {
        if self.success {
            self.value.as_ref()
        } else {
            None
        }
    }

    pub fn version_for(&self, component: &str, env: Environment) -> Option<&str> {
        self.config().and_then(|c| c.version_for(component, env))
    }

    pub fn require_version(&self, component: &str, env: Environment) -> RemoteResult<&str> {
        if !self.success {
            warn!(
                "Version lookup for {} reported failure: {}",
                component,
                self.message.as_deref().unwrap_or("no message")
            );
        }

        self.version_for(component, env)
            .ok_or_else(|| RemoteError::VersionNotFound {
                component: component.to_string(),
                environment: env,
            })
    }
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Fetches the document fresh on every call.
    async fn fetch(&self, config_api_url: &str) -> RemoteResult<VersionEnvelope>;
}

pub struct HttpVersionClient {
    client: reqwest::Client,
}

impl HttpVersionClient {
    pub fn new(config: VersionClientConfig) -> RemoteResult<Self> {
        config
            .validate()
            .map_err(|message| RemoteError::InvalidConfig { message })?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| RemoteError::InvalidConfig {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self { client })
    }

    pub fn with_default_config() -> RemoteResult<Self> {
        Self::new(VersionClientConfig::default())
    }

    fn fetch_error(url: &str, err: reqwest::Error) -> RemoteError {
        let message = if err.is_timeout() {
            "request timeout".to_string()
        } else if err.is_connect() {
            "cannot connect to config service".to_string()
        } else {
            err.to_string()
        };

        RemoteError::ConfigFetch {
            url: url.to_string(),
            message,
        }
    }
}

#[async_trait]
impl VersionSource for HttpVersionClient {
    async fn fetch(&self, config_api_url: &str) -> RemoteResult<VersionEnvelope> {
        debug!("Fetching version config from {}", config_api_url);

        let response = self
            .client
            .get(config_api_url)
            .send()
            .await
            .map_err(|e| Self::fetch_error(config_api_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::ConfigFetch {
                url: config_api_url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::fetch_error(config_api_url, e))?;

        serde_json::from_str(&body).map_err(|e| RemoteError::ConfigFetch {
            url: config_api_url.to_string(),
            message: format!("invalid version document: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parsing() {
        let envelope: VersionEnvelope = serde_json::from_str(
            r#"{"success": true, "value": {"widgetA": {"test": "2.1.0", "prod": "2.0.3"}}, "message": ""}"#,
        )
        .unwrap();

        assert_eq!(envelope.version_for("widgetA", Environment::Test), Some("2.1.0"));
        assert_eq!(envelope.version_for("widgetA", Environment::Prod), Some("2.0.3"));
        assert_eq!(envelope.version_for("widgetA", Environment::Staging), None);
        assert_eq!(envelope.version_for("widgetB", Environment::Test), None);
    }

    #[test]
    fn test_unsuccessful_envelope_has_no_versions() {
        let envelope: VersionEnvelope = serde_json::from_str(
            r#"{"success": false, "value": {"widgetA": {"test": "2.1.0"}}, "message": "denied"}"#,
        )
        .unwrap();
        assert!(envelope.config().is_none());
        assert!(matches!(
            envelope.require_version("widgetA", Environment::Test),
            Err(RemoteError::VersionNotFound { .. })
        ));

        let envelope: VersionEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(envelope.version_for("widgetA", Environment::Test).is_none());
    }

    #[test]
    fn test_irregular_sibling_entry_is_ignored() {
        let envelope: VersionEnvelope = serde_json::from_str(
            r#"{"success":true,"value":{"widgetA":{"test":"2.1.0"},"legacy":{"test":null,"status":1},"broken":7}}"#,
        )
        .unwrap();

        assert_eq!(envelope.version_for("widgetA", Environment::Test), Some("2.1.0"));
        assert_eq!(envelope.version_for("legacy", Environment::Test), None);
        assert_eq!(envelope.version_for("broken", Environment::Test), None);
        assert!(matches!(
            envelope.require_version("legacy", Environment::Test),
            Err(RemoteError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_long_tier_keys() {
        let config: VersionConfig =
            serde_json::from_str(r#"{"widgetA":{"production":"3.0.0","development":"3.1.0"}}"#)
                .unwrap();
        assert_eq!(config.version_for("widgetA", Environment::Prod), Some("3.0.0"));
        assert_eq!(config.version_for("widgetA", Environment::Dev), Some("3.1.0"));

        let config: VersionConfig = serde_json::from_str(
            r#"{"widgetA":{"prod":"3.0.1","production":"3.0.0","dev":"","development":"3.1.0"}}"#,
        )
        .unwrap();
        assert_eq!(config.version_for("widgetA", Environment::Prod), Some("3.0.1"));
        assert_eq!(config.version_for("widgetA", Environment::Dev), Some("3.1.0"));
    }

    #[test]
    fn test_with_version_replaces_irregular_entry() {
        let config: VersionConfig = serde_json::from_str(r#"{"widgetA":null}"#).unwrap();
        let config = config.with_version("widgetA", Environment::Staging, "1.0.0");
        assert_eq!(config.version_for("widgetA", Environment::Staging), Some("1.0.0"));
    }

    #[test]
    fn test_empty_version_is_missing() {
        let config = VersionConfig::new().with_version("widgetA", Environment::Test, "");
        assert_eq!(config.version_for("widgetA", Environment::Test), None);
    }

    #[test]
    fn test_require_version() {
        let envelope = VersionEnvelope::ok(VersionConfig::new().with_version(
            "widgetA",
            Environment::Dev,
            "0.9.1",
        ));
        assert_eq!(envelope.require_version("widgetA", Environment::Dev), Ok("0.9.1"));
        assert_eq!(
            envelope.require_version("widgetA", Environment::Test),
            Err(RemoteError::VersionNotFound {
                component: "widgetA".to_string(),
                environment: Environment::Test,
            })
        );
    }

    #[test]
    fn test_client_rejects_zero_timeout() {
        let config = VersionClientConfig::default().with_timeout(std::time::Duration::ZERO);
        assert!(matches!(
            HttpVersionClient::new(config),
            Err(RemoteError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_parses_document() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/nodeapi/lionConfig")
            .match_query(mockito::Matcher::UrlEncoded(
                "key".into(),
                "rdc_component_version".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"value":{"widgetA":{"test":"2.1.0"}},"message":""}"#)
            .create_async()
            .await;

        let client = HttpVersionClient::with_default_config().unwrap();
        let url = format!("{}/nodeapi/lionConfig?key=rdc_component_version", server.url());
        let envelope = client.fetch(&url).await.unwrap();
        assert_eq!(envelope.version_for("widgetA", Environment::Test), Some("2.1.0"));
    }

    #[tokio::test]
    async fn test_fetch_reports_malformed_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/config")
            .with_status(200)
            .with_body("not valid json")
            .create_async()
            .await;

        let client = HttpVersionClient::with_default_config().unwrap();
        let url = format!("{}/config", server.url());
        let result = client.fetch(&url).await;
        assert!(matches!(result, Err(RemoteError::ConfigFetch { url: u, .. }) if u == url));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/config")
            .with_status(503)
            .create_async()
            .await;

        let client = HttpVersionClient::with_default_config().unwrap();
        let result = client.fetch(&format!("{}/config", server.url())).await;
        match result {
            Err(RemoteError::ConfigFetch { message, .. }) => assert!(message.contains("503")),
            other => panic!("expected ConfigFetch, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_reports_unreachable_host() {
        let client = HttpVersionClient::with_default_config().unwrap();
        let result = tokio_test::block_on(client.fetch("http://127.0.0.1:1/config"));
        assert!(matches!(result, Err(RemoteError::ConfigFetch { .. })));
    }
}
