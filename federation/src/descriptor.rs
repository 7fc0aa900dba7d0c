//! Build-time remote generation.
//!
//! [`generate_remotes`] turns a component list into one [`RemoteDescriptor`]
//! per component. A descriptor is consumed directly by
//! [`RemoteResolver`](crate::resolver::RemoteResolver), or serialized for a
//! bundler through [`render_remotes`].

use crate::config::GeneratorOptions;
use crate::environment::Environment;
use crate::error::{RemoteError, RemoteResult};
use crate::share::ShareScope;
use crate::template;
use crate::url::remote_entry_url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDescriptor {
    pub component_name: String,
    pub config_api_url: String,
    pub rdc_base_url: String,
    pub environment: Environment,
}

impl RemoteDescriptor {
    pub fn new(
        component_name: impl Into<String>,
        config_api_url: impl Into<String>,
        rdc_base_url: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            config_api_url: config_api_url.into(),
            rdc_base_url: rdc_base_url.into(),
            environment,
        }
    }

    pub fn remote_entry_url(&self, version: &str) -> String {
        remote_entry_url(&self.rdc_base_url, &self.component_name, version)
    }

    /// `promise ...` source for webpack's `ModuleFederationPlugin`.
    pub fn to_promise_remote(&self) -> String {
        template::promise_remote(self)
    }

    /// Remote entry for `@originjs/vite-plugin-federation`.
    pub fn to_external_remote(&self) -> ExternalRemote {
        ExternalRemote {
            external: template::external_entry(self),
            external_type: "promise".to_string(),
            format: "var".to_string(),
            from: "webpack".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRemote {
    pub external: String,
    pub external_type: String,
    pub format: String,
    pub from: String,
}

pub type RemoteMap = BTreeMap<String, RemoteDescriptor>;

/// Fails immediately on an empty or malformed component list.
pub fn generate_remotes(options: &GeneratorOptions) -> RemoteResult<RemoteMap> {
    options
        .validate()
        .map_err(|message| RemoteError::InvalidConfig { message })?;

    let env = options.environment();
    let config_api_url = options.effective_config_api_url();
    let rdc_base_url = options.effective_rdc_base_url();

    debug!(
        "Generating {} remotes for {} from {}",
        options.components.len(),
        env,
        rdc_base_url
    );

    Ok(options
        .components
        .iter()
        .map(|name| {
            (
                name.clone(),
                RemoteDescriptor::new(name, &config_api_url, &rdc_base_url, env),
            )
        })
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteFlavor {
    /// Source strings with a `promise` prefix.
    #[default]
    Webpack,
    /// `{external, externalType, format, from}` objects.
    Vite,
}

impl fmt::Display for RemoteFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFlavor::Webpack => f.write_str("webpack"),
            RemoteFlavor::Vite => f.write_str("vite"),
        }
    }
}

impl FromStr for RemoteFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webpack" => Ok(RemoteFlavor::Webpack),
            "vite" => Ok(RemoteFlavor::Vite),
            other => Err(format!("Unknown flavor '{}', expected webpack or vite", other)),
        }
    }
}

pub fn render_remotes(remotes: &RemoteMap, flavor: RemoteFlavor) -> serde_json::Value {
    let rendered = remotes
        .iter()
        .map(|(name, descriptor)| {
            let value = match flavor {
                RemoteFlavor::Webpack => serde_json::Value::String(descriptor.to_promise_remote()),
                RemoteFlavor::Vite => serde_json::json!(descriptor.to_external_remote()),
            };
            (name.clone(), value)
        })
        .collect();
    serde_json::Value::Object(rendered)
}

/// The `remotes` and `shared` sections of a federation plugin config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederationConfig {
    pub remotes: serde_json::Value,
    pub shared: ShareScope,
}

pub fn generate_federation_config(
    options: &GeneratorOptions,
    flavor: RemoteFlavor,
) -> RemoteResult<FederationConfig> {
    let remotes = generate_remotes(options)?;
    Ok(FederationConfig {
        remotes: render_remotes(&remotes, flavor),
        shared: options.share_scope(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GeneratorOptions {
        GeneratorOptions::new(["widgetA", "device-manage"])
            .with_config_api_url("https://config.example/versions")
            .with_rdc_base_url("https://cdn.example/rdc")
    }

    #[test]
    fn test_empty_components_fail_immediately() {
        let result = generate_remotes(&GeneratorOptions::new(Vec::<String>::new()));
        assert!(matches!(result, Err(RemoteError::InvalidConfig { .. })));
    }

    #[test]
    fn test_one_descriptor_per_component() {
        let remotes = generate_remotes(&options()).unwrap();
        assert_eq!(remotes.len(), 2);

        let widget = &remotes["widgetA"];
        assert_eq!(
            widget,
            &RemoteDescriptor::new(
                "widgetA",
                "https://config.example/versions",
                "https://cdn.example/rdc",
                Environment::Test
            )
        );
        assert_eq!(
            widget.remote_entry_url("2.1.0"),
            "https://cdn.example/rdc/qa-rdc-widgetA/webpack/2.1.0/remoteEntry.js"
        );
    }

    #[test]
    fn test_defaults_follow_environment() {
        let remotes =
            generate_remotes(&GeneratorOptions::new(["widgetA"]).with_env(Environment::Prod))
                .unwrap();
        let widget = &remotes["widgetA"];
        assert_eq!(widget.environment, Environment::Prod);
        assert_eq!(widget.rdc_base_url, Environment::Prod.defaults().rdc_base_url);
        assert_eq!(
            widget.config_api_url,
            Environment::Prod.defaults().config_api_url
        );
    }

    #[test]
    fn test_render_flavors() {
        let remotes = generate_remotes(&options()).unwrap();

        let webpack = render_remotes(&remotes, RemoteFlavor::Webpack);
        let source = webpack["widgetA"].as_str().unwrap();
        assert!(source.starts_with("promise "));

        let vite = render_remotes(&remotes, RemoteFlavor::Vite);
        assert_eq!(vite["device-manage"]["externalType"], "promise");
        assert_eq!(vite["device-manage"]["format"], "var");
        assert_eq!(vite["device-manage"]["from"], "webpack");
        assert!(vite["device-manage"]["external"]
            .as_str()
            .unwrap()
            .contains("qa-rdc-device-manage/webpack/"));
    }

    #[test]
    fn test_federation_config_includes_shared() {
        let config = generate_federation_config(&options(), RemoteFlavor::Vite).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["shared"]["react"]["singleton"], true);
        assert!(json["remotes"]["widgetA"].is_object());
    }

    #[test]
    fn test_flavor_parsing() {
        assert_eq!("Vite".parse::<RemoteFlavor>(), Ok(RemoteFlavor::Vite));
        assert_eq!(RemoteFlavor::default().to_string(), "webpack");
        assert!("rollup".parse::<RemoteFlavor>().is_err());
    }
}
