mod options;

use clap::{Parser, Subcommand};
use federation::prelude::*;
use options::SourceArgs;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "rdc")]
#[command(about = "Generate and check module-federation remotes for RDC components")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the remotes and shared sections for a federation plugin
    Generate {
        #[command(flatten)]
        source: SourceArgs,
        /// Output flavor: webpack or vite
        #[arg(short, long, default_value = "webpack")]
        flavor: RemoteFlavor,
    },
    /// Look up published versions and print each remote entry URL
    Resolve {
        #[command(flatten)]
        source: SourceArgs,
        /// Request timeout in seconds (none by default)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the version document for every component in a tier
    Versions {
        /// Version lookup endpoint, overrides the tier default
        #[arg(long)]
        config_api_url: Option<String>,
        /// Deployment tier: dev, test, staging or prod
        #[arg(short, long, env = "MF_ENV", default_value = "test")]
        env: Environment,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { source, flavor } => {
            generate(source, flavor)?;
        }
        Commands::Resolve { source, timeout } => {
            resolve(source, timeout).await?;
        }
        Commands::Versions {
            config_api_url,
            env,
        } => {
            versions(config_api_url, env).await?;
        }
    }

    Ok(())
}

fn generate(source: SourceArgs, flavor: RemoteFlavor) -> Result<(), Box<dyn std::error::Error>> {
    let options = source.into_options()?;
    let config = generate_federation_config(&options, flavor)?;
    info!(
        "Generated {} {} remotes for {}",
        options.components.len(),
        flavor,
        options.environment()
    );
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn version_client(timeout: Option<u64>) -> RemoteResult<HttpVersionClient> {
    let mut config = VersionClientConfig::default();
    if let Some(secs) = timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    HttpVersionClient::new(config)
}

/// Only the version lookup runs, so the resolver never loads a script.
fn url_resolver(versions: Arc<dyn VersionSource>) -> RemoteResult<RemoteResolver> {
    let registry = ContainerRegistry::new();
    let scripts = InProcessScriptLoader::new(registry.clone());
    RemoteResolver::new(
        versions,
        Arc::new(scripts),
        registry,
        ResolverConfig::default(),
    )
}

async fn entry_urls(
    resolver: &RemoteResolver,
    remotes: &RemoteMap,
) -> Vec<(String, RemoteResult<String>)> {
    let mut results = Vec::with_capacity(remotes.len());
    for (name, descriptor) in remotes {
        results.push((name.clone(), resolver.resolve_entry_url(descriptor).await));
    }
    results
}

async fn resolve(source: SourceArgs, timeout: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let options = source.into_options()?;
    let remotes = generate_remotes(&options)?;
    let resolver = url_resolver(Arc::new(version_client(timeout)?))?;

    let mut failures = 0;
    for (name, result) in entry_urls(&resolver, &remotes).await {
        match result {
            Ok(url) => println!("{}\t{}", name, url),
            Err(e) => {
                println!("{}\t<unresolved: {}>", name, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} remotes could not be resolved", failures, remotes.len()).into());
    }
    Ok(())
}

async fn versions(
    config_api_url: Option<String>,
    env: Environment,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = config_api_url.unwrap_or_else(|| env.defaults().config_api_url.to_string());
    let client = version_client(None)?;
    let envelope = client.fetch(&url).await?;

    let Some(config) = envelope.config() else {
        let message = envelope.message.clone().unwrap_or_default();
        return Err(format!("Version lookup was not successful: {}", message).into());
    };

    println!("Versions in {}:", env);
    for component in config.components() {
        match config.version_for(component, env) {
            Some(version) => println!("  {:<32} {}", component, version),
            None => println!("  {:<32} -", component),
        }
    }
    Ok(())
}
