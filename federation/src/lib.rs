pub mod config;
pub mod container;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod host;
pub mod loader;
pub mod resolver;
pub mod share;
pub mod template;
pub mod url;
pub mod version;

pub use config::{GeneratorOptions, ResolverConfig, VersionClientConfig};
pub use container::{AdaptedContainer, ContainerRegistry, Module, RemoteContainer};
pub use descriptor::{
    generate_federation_config, generate_remotes, render_remotes, ExternalRemote,
    FederationConfig, RemoteDescriptor, RemoteFlavor, RemoteMap,
};
pub use environment::{EnvDefaults, Environment};
pub use error::{RemoteError, RemoteResult};
pub use host::RemoteHost;
pub use loader::{
    DocumentHead, HttpScriptLoader, InProcessScriptLoader, ScriptElement, ScriptEvaluator,
    ScriptLoader,
};
pub use resolver::{RemoteResolver, RemoteState};
pub use share::{
    default_share_scope, merge_share_scope, ShareScope, ShareScopeOverride, SharedDependency,
    SharedOverride,
};
pub use url::remote_entry_url;
pub use version::{HttpVersionClient, VersionConfig, VersionEnvelope, VersionSource};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::container::*;
    pub use crate::descriptor::*;
    pub use crate::environment::*;
    pub use crate::error::*;
    pub use crate::host::*;
    pub use crate::loader::*;
    pub use crate::resolver::*;
    pub use crate::share::*;
    pub use crate::version::*;
}
