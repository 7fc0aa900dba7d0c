//! Remote containers, the registry they install themselves into, and the
//! adapter that gives every remote the same `{get, init}` contract.

use crate::error::{RemoteError, RemoteResult};
use crate::share::ShareScope;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// An exposed module as handed out by a container's `get`.
pub type Module = Arc<dyn Any + Send + Sync>;

/// What a remote entry script installs once it runs.
///
/// Both methods default to reporting themselves missing so a partial
/// implementation models a malformed remote.
#[async_trait]
pub trait RemoteContainer: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, _request: &str) -> RemoteResult<Module> {
        Err(RemoteError::ContainerMethodMissing {
            component: self.name().to_string(),
            method: "get",
        })
    }

    async fn init(&self, _share_scope: Option<&ShareScope>) -> RemoteResult<()> {
        Err(RemoteError::ContainerMethodMissing {
            component: self.name().to_string(),
            method: "init",
        })
    }
}

/// Name-keyed container bindings shared by the host and every remote.
///
/// Registering a name twice replaces the earlier binding.
#[derive(Clone, Default)]
pub struct ContainerRegistry {
    bindings: Arc<RwLock<HashMap<String, Arc<dyn RemoteContainer>>>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        container: Arc<dyn RemoteContainer>,
    ) -> Option<Arc<dyn RemoteContainer>> {
        let name = name.into();
        debug!("Registering remote container {}", name);
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, container)
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn RemoteContainer>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Uniform wrapper around the binding registered under `component`.
///
/// The binding is looked up again on every call, so a later registration
/// of the same name takes over.
#[derive(Clone, Debug)]
pub struct AdaptedContainer {
    component: String,
    registry: ContainerRegistry,
}

impl AdaptedContainer {
    /// Fails with [`RemoteError::ContainerMissing`] when the script ran but
    /// installed nothing under `component`.
    pub fn adapt(registry: &ContainerRegistry, component: &str) -> RemoteResult<Self> {
        if !registry.contains(component) {
            return Err(RemoteError::ContainerMissing {
                component: component.to_string(),
            });
        }

        Ok(Self {
            component: component.to_string(),
            registry: registry.clone(),
        })
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    fn binding(&self, method: &'static str) -> RemoteResult<Arc<dyn RemoteContainer>> {
        self.registry
            .resolve(&self.component)
            .ok_or_else(|| RemoteError::ContainerMethodMissing {
                component: self.component.clone(),
                method,
            })
    }

    async fn try_init(&self, share_scope: Option<&ShareScope>) -> RemoteResult<()> {
        let binding = self.binding("init")?;
        binding.init(share_scope).await.map_err(|e| match e {
            e @ RemoteError::ContainerMethodMissing { .. } => e,
            other => RemoteError::ContainerInit {
                component: self.component.clone(),
                message: other.to_string(),
            },
        })
    }
}

#[async_trait]
impl RemoteContainer for AdaptedContainer {
    fn name(&self) -> &str {
        &self.component
    }

    async fn get(&self, request: &str) -> RemoteResult<Module> {
        debug!("Getting {} from remote {}", request, self.component);
        self.binding("get")?.get(request).await
    }

    /// Never fails. A container that was already initialized by an earlier
    /// load rejects the second call; that rejection is logged and dropped.
    async fn init(&self, share_scope: Option<&ShareScope>) -> RemoteResult<()> {
        match self.try_init(share_scope).await {
            Ok(()) => {}
            Err(e @ RemoteError::ContainerMethodMissing { .. }) => {
                warn!("Skipping init of remote {}: {}", self.component, e);
            }
            Err(e) => warn!("Remote container already initialized: {}", e),
        }
        Ok(())
    }
}
