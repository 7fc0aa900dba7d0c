use crate::environment::Environment;
use crate::resolver::RemoteState;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Failed to fetch version config from {url}: {message}")]
    ConfigFetch { url: String, message: String },

    #[error("Version not found in config for {component}.{environment}")]
    VersionNotFound {
        component: String,
        environment: Environment,
    },

    #[error("Failed to load remoteEntry.js: {url} ({message})")]
    ScriptLoad { url: String, message: String },

    #[error("Remote container {component} not found after script load")]
    ContainerMissing { component: String },

    #[error("Remote container {component}.{method} is not available")]
    ContainerMethodMissing {
        component: String,
        method: &'static str,
    },

    #[error("Remote container {component} failed to initialize: {message}")]
    ContainerInit { component: String, message: String },

    #[error("Module {request} is not exposed by remote {component}")]
    ModuleNotFound { component: String, request: String },

    #[error("Unknown remote: {component}")]
    UnknownRemote { component: String },

    #[error("Remote {component} timed out while {stage}")]
    Timeout {
        component: String,
        stage: RemoteState,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type RemoteResult<T> = Result<T, RemoteError>;
