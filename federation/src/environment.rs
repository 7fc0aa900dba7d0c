//! Deployment tiers and their built-in endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A deployment tier selecting which versions and base URLs apply.
///
/// The lowercase short name is also the key used inside the version
/// document, e.g. `{"widgetA": {"test": "2.1.0"}}`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "development")]
    Dev,
    #[default]
    Test,
    Staging,
    #[serde(alias = "production")]
    Prod,
}

/// Endpoints a tier uses when the caller does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvDefaults {
    pub config_api_url: &'static str,
    pub rdc_base_url: &'static str,
}

const DEV_DEFAULTS: EnvDefaults = EnvDefaults {
    config_api_url:
        "https://automan.waimai.dev.sankuai.com/nodeapi/lionConfig?key=rdc_component_version",
    rdc_base_url: "https://aie.waimai.dev.sankuai.com/rdc_host/rdc",
};

const TEST_DEFAULTS: EnvDefaults = EnvDefaults {
    config_api_url:
        "https://automan.waimai.test.sankuai.com/nodeapi/lionConfig?key=rdc_component_version",
    rdc_base_url: "https://aie.waimai.test.sankuai.com/rdc_host/rdc",
};

const STAGING_DEFAULTS: EnvDefaults = EnvDefaults {
    config_api_url:
        "https://automan.waimai.staging.sankuai.com/nodeapi/lionConfig?key=rdc_component_version",
    rdc_base_url: "https://aie.waimai.staging.sankuai.com/rdc_host/rdc",
};

const PROD_DEFAULTS: EnvDefaults = EnvDefaults {
    config_api_url:
        "https://automan.waimai.sankuai.com/nodeapi/lionConfig?key=rdc_component_version",
    rdc_base_url: "https://aie.waimai.sankuai.com/rdc_host/rdc",
};

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Dev,
        Environment::Test,
        Environment::Staging,
        Environment::Prod,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Spelled-out key some version documents use instead of [`key`](Self::key).
    pub fn long_key(&self) -> &'static str {
        match self {
            Environment::Dev => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Prod => "production",
        }
    }

    pub fn defaults(&self) -> EnvDefaults {
        match self {
            Environment::Dev => DEV_DEFAULTS,
            Environment::Test => TEST_DEFAULTS,
            Environment::Staging => STAGING_DEFAULTS,
            Environment::Prod => PROD_DEFAULTS,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "test" => Ok(Environment::Test),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!(
                "Unknown environment '{}', expected one of dev, test, staging, prod",
                other
            )),
        }
    }
}
