use clap::Args;
use federation::prelude::*;
use std::path::PathBuf;

/// Where the component list and endpoints come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// TOML file with components, env, configApiUrl, rdcBaseUrl and shared
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Components to generate remotes for (repeatable or comma separated)
    #[arg(short, long = "component", value_delimiter = ',')]
    pub components: Vec<String>,
    /// Deployment tier: dev, test, staging or prod
    #[arg(short, long, env = "MF_ENV")]
    pub env: Option<Environment>,
    /// Version lookup endpoint, overrides the tier default
    #[arg(long)]
    pub config_api_url: Option<String>,
    /// Base URL remotes are published under, overrides the tier default
    #[arg(long)]
    pub rdc_base_url: Option<String>,
}

impl SourceArgs {
    /// Flags override the file; components given on the command line
    /// replace the file's list.
    pub fn into_options(self) -> RemoteResult<GeneratorOptions> {
        let mut options = match &self.config {
            Some(path) => GeneratorOptions::from_file(path)?,
            None => GeneratorOptions::default(),
        };

        if !self.components.is_empty() {
            options.components = self.components;
        }
        if let Some(env) = self.env {
            options.env = Some(env);
        }
        if let Some(url) = self.config_api_url {
            options.config_api_url = Some(url);
        }
        if let Some(url) = self.rdc_base_url {
            options.rdc_base_url = Some(url);
        }

        options
            .validate()
            .map_err(|message| RemoteError::InvalidConfig { message })?;
        Ok(options)
    }
}
