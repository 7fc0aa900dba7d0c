//! Per-remote resolution pipeline.
//!
//! ```text
//! Unresolved -> FetchingVersion -> (VersionMissing | UrlBuilt)
//!            -> LoadingScript -> (LoadFailed | ScriptLoaded)
//!            -> AdaptingContainer -> (ContainerMissing | Ready)
//! ```
//!
//! Each step starts only after its predecessor resolved. Different remotes
//! run independently. Failures are never cached; the next call starts over.

use crate::config::ResolverConfig;
use crate::container::{AdaptedContainer, ContainerRegistry};
use crate::descriptor::RemoteDescriptor;
use crate::error::{RemoteError, RemoteResult};
use crate::loader::ScriptLoader;
use crate::version::VersionSource;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Unresolved,
    FetchingVersion,
    ConfigFetchFailed,
    VersionMissing,
    UrlBuilt,
    LoadingScript,
    LoadFailed,
    ScriptLoaded,
    AdaptingContainer,
    ContainerMissing,
    Ready,
}

impl RemoteState {
    pub fn is_terminal(&self) -> bool {
        self.is_failure() || *self == RemoteState::Ready
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RemoteState::ConfigFetchFailed
                | RemoteState::VersionMissing
                | RemoteState::LoadFailed
                | RemoteState::ContainerMissing
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            RemoteState::Unresolved => "unresolved",
            RemoteState::FetchingVersion => "fetching_version",
            RemoteState::ConfigFetchFailed => "config_fetch_failed",
            RemoteState::VersionMissing => "version_missing",
            RemoteState::UrlBuilt => "url_built",
            RemoteState::LoadingScript => "loading_script",
            RemoteState::LoadFailed => "load_failed",
            RemoteState::ScriptLoaded => "script_loaded",
            RemoteState::AdaptingContainer => "adapting_container",
            RemoteState::ContainerMissing => "container_missing",
            RemoteState::Ready => "ready",
        }
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type InFlight = Shared<BoxFuture<'static, RemoteResult<AdaptedContainer>>>;

struct ResolverInner {
    versions: Arc<dyn VersionSource>,
    scripts: Arc<dyn ScriptLoader>,
    registry: ContainerRegistry,
    config: ResolverConfig,
    states: Mutex<HashMap<String, RemoteState>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

/// Turns a [`RemoteDescriptor`] into a ready container.
#[derive(Clone)]
pub struct RemoteResolver {
    inner: Arc<ResolverInner>,
}

impl RemoteResolver {
    pub fn new(
        versions: Arc<dyn VersionSource>,
        scripts: Arc<dyn ScriptLoader>,
        registry: ContainerRegistry,
        config: ResolverConfig,
    ) -> RemoteResult<Self> {
        config
            .validate()
            .map_err(|message| RemoteError::InvalidConfig { message })?;

        Ok(Self {
            inner: Arc::new(ResolverInner {
                versions,
                scripts,
                registry,
                config,
                states: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    /// Last state reached by `component`, `Unresolved` if never touched.
    pub fn state(&self, component: &str) -> RemoteState {
        self.inner
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component)
            .copied()
            .unwrap_or(RemoteState::Unresolved)
    }

    /// Version lookup and URL construction only.
    pub async fn resolve_entry_url(&self, descriptor: &RemoteDescriptor) -> RemoteResult<String> {
        self.inner.entry_url(descriptor).await
    }

    pub async fn resolve(&self, descriptor: &RemoteDescriptor) -> RemoteResult<AdaptedContainer> {
        if !self.inner.config.dedupe_in_flight {
            return self.inner.clone().run(descriptor.clone()).await;
        }

        let component = descriptor.component_name.clone();
        let load = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match in_flight.get(&component) {
                Some(existing) => {
                    debug!("Joining in-flight load of {}", component);
                    existing.clone()
                }
                None => {
                    let load = self
                        .inner
                        .clone()
                        .run_and_release(descriptor.clone())
                        .boxed()
                        .shared();
                    in_flight.insert(component, load.clone());
                    load
                }
            }
        };

        load.await
    }
}

impl ResolverInner {
    fn transition(&self, component: &str, state: RemoteState) {
        debug!("Remote {} -> {}", component, state);
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(component.to_string(), state);
    }

    fn fail(&self, component: &str, state: RemoteState, err: RemoteError) -> RemoteError {
        self.transition(component, state);
        error!("Remote {} failed: {}", component, err);
        err
    }

    async fn within_deadline<T, F>(
        &self,
        component: &str,
        stage: RemoteState,
        step: F,
    ) -> RemoteResult<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, step)
                .await
                .unwrap_or_else(|_| {
                    Err(RemoteError::Timeout {
                        component: component.to_string(),
                        stage,
                    })
                }),
            None => step.await,
        }
    }

    async fn entry_url(&self, descriptor: &RemoteDescriptor) -> RemoteResult<String> {
        let component = descriptor.component_name.as_str();

        self.transition(component, RemoteState::FetchingVersion);
        let envelope = self
            .within_deadline(
                component,
                RemoteState::FetchingVersion,
                self.versions.fetch(&descriptor.config_api_url),
            )
            .await
            .map_err(|e| self.fail(component, RemoteState::ConfigFetchFailed, e))?;

        let version = envelope
            .require_version(component, descriptor.environment)
            .map_err(|e| self.fail(component, RemoteState::VersionMissing, e))?;
        debug!("Resolved {} version {}", component, version);

        let url = descriptor.remote_entry_url(version);
        self.transition(component, RemoteState::UrlBuilt);
        Ok(url)
    }

    async fn run(self: Arc<Self>, descriptor: RemoteDescriptor) -> RemoteResult<AdaptedContainer> {
        let component = descriptor.component_name.as_str();
        let url = self.entry_url(&descriptor).await?;

        self.transition(component, RemoteState::LoadingScript);
        self.within_deadline(component, RemoteState::LoadingScript, self.scripts.load(&url))
            .await
            .map_err(|e| self.fail(component, RemoteState::LoadFailed, e))?;
        self.transition(component, RemoteState::ScriptLoaded);

        self.transition(component, RemoteState::AdaptingContainer);
        let container = AdaptedContainer::adapt(&self.registry, component)
            .map_err(|e| self.fail(component, RemoteState::ContainerMissing, e))?;

        self.transition(component, RemoteState::Ready);
        info!("Remote {} ready from {}", component, url);
        Ok(container)
    }

    /// Runs the pipeline and drops the in-flight entry before the result is
    /// published, so nobody joins a load that already finished.
    async fn run_and_release(
        self: Arc<Self>,
        descriptor: RemoteDescriptor,
    ) -> RemoteResult<AdaptedContainer> {
        let component = descriptor.component_name.clone();
        let result = self.clone().run(descriptor).await;
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&component);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::RemoteContainer;
    use crate::environment::Environment;
    use crate::loader::InProcessScriptLoader;
    use crate::version::{VersionConfig, VersionEnvelope};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const BASE: &str = "https://cdn.example/rdc";
    const CONFIG: &str = "https://config.example/versions";
    const ENTRY: &str = "https://cdn.example/rdc/qa-rdc-widgetA/webpack/2.1.0/remoteEntry.js";

    struct StaticVersions {
        envelope: VersionEnvelope,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl VersionSource for StaticVersions {
        async fn fetch(&self, config_api_url: &str) -> RemoteResult<VersionEnvelope> {
            assert_eq!(config_api_url, CONFIG);
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(self.envelope.clone())
        }
    }

    struct HangingVersions;

    #[async_trait]
    impl VersionSource for HangingVersions {
        async fn fetch(&self, _config_api_url: &str) -> RemoteResult<VersionEnvelope> {
            futures::future::pending().await
        }
    }

    struct HangingScripts;

    #[async_trait]
    impl ScriptLoader for HangingScripts {
        async fn load(&self, _url: &str) -> RemoteResult<()> {
            futures::future::pending().await
        }
    }

    struct Widget;

    impl RemoteContainer for Widget {
        fn name(&self) -> &str {
            "widgetA"
        }
    }

    fn versions() -> Arc<StaticVersions> {
        Arc::new(StaticVersions {
            envelope: VersionEnvelope::ok(VersionConfig::new().with_version(
                "widgetA",
                Environment::Test,
                "2.1.0",
            )),
            fetches: AtomicUsize::new(0),
        })
    }

    fn descriptor() -> RemoteDescriptor {
        RemoteDescriptor::new("widgetA", CONFIG, BASE, Environment::Test)
    }

    fn setup(
        config: ResolverConfig,
    ) -> (RemoteResolver, InProcessScriptLoader, Arc<StaticVersions>) {
        let registry = ContainerRegistry::new();
        let loader = InProcessScriptLoader::new(registry.clone());
        let versions = versions();
        let resolver =
            RemoteResolver::new(versions.clone(), Arc::new(loader.clone()), registry, config)
                .unwrap();
        (resolver, loader, versions)
    }

    fn serve_widget(loader: &InProcessScriptLoader) {
        loader.serve(ENTRY, |registry| {
            registry.register("widgetA", Arc::new(Widget));
        });
    }

    #[tokio::test]
    async fn test_resolve_reaches_ready() {
        let (resolver, loader, _) = setup(ResolverConfig::default());
        serve_widget(&loader);

        assert_eq!(resolver.state("widgetA"), RemoteState::Unresolved);
        let container = resolver.resolve(&descriptor()).await.unwrap();
        assert_eq!(container.component(), "widgetA");
        assert_eq!(resolver.state("widgetA"), RemoteState::Ready);
        assert_eq!(loader.head().scripts()[0].src, ENTRY);
    }

    #[tokio::test]
    async fn test_missing_version_never_injects() {
        let (resolver, loader, _) = setup(ResolverConfig::default());
        let descriptor = RemoteDescriptor::new("widgetB", CONFIG, BASE, Environment::Test);

        let err = resolver.resolve(&descriptor).await.unwrap_err();
        assert!(matches!(err, RemoteError::VersionNotFound { .. }));
        assert_eq!(resolver.state("widgetB"), RemoteState::VersionMissing);
        assert!(loader.head().is_empty());
    }

    #[tokio::test]
    async fn test_script_without_container() {
        let (resolver, loader, _) = setup(ResolverConfig::default());
        loader.serve(ENTRY, |_| {});

        let err = resolver.resolve(&descriptor()).await.unwrap_err();
        assert!(matches!(err, RemoteError::ContainerMissing { .. }));
        assert_eq!(resolver.state("widgetA"), RemoteState::ContainerMissing);
    }

    #[tokio::test]
    async fn test_load_failure_then_retry() {
        let (resolver, loader, versions) = setup(ResolverConfig::default());

        let err = resolver.resolve(&descriptor()).await.unwrap_err();
        assert!(matches!(err, RemoteError::ScriptLoad { ref url, .. } if url == ENTRY));
        assert_eq!(resolver.state("widgetA"), RemoteState::LoadFailed);

        serve_widget(&loader);
        resolver.resolve(&descriptor()).await.unwrap();
        assert_eq!(versions.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(loader.head().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_pipeline() {
        let (resolver, loader, versions) = setup(ResolverConfig::default());
        serve_widget(&loader);

        let d = descriptor();
        let (a, b) = tokio::join!(resolver.resolve(&d), resolver.resolve(&d));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(versions.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(loader.head().len(), 1);

        resolver.resolve(&d).await.unwrap();
        assert_eq!(versions.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads_without_dedupe_inject_twice() {
        let (resolver, loader, versions) =
            setup(ResolverConfig::default().with_dedupe_in_flight(false));
        serve_widget(&loader);

        let d = descriptor();
        let (a, b) = tokio::join!(resolver.resolve(&d), resolver.resolve(&d));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(versions.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(loader.head().len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_applies_to_fetch() {
        let registry = ContainerRegistry::new();
        let loader = InProcessScriptLoader::new(registry.clone());
        let resolver = RemoteResolver::new(
            Arc::new(HangingVersions),
            Arc::new(loader),
            registry,
            ResolverConfig::default().with_deadline(Duration::from_millis(20)),
        )
        .unwrap();

        let err = resolver.resolve(&descriptor()).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Timeout {
                component: "widgetA".to_string(),
                stage: RemoteState::FetchingVersion,
            }
        );
        assert_eq!(resolver.state("widgetA"), RemoteState::ConfigFetchFailed);
    }

    #[tokio::test]
    async fn test_deadline_applies_to_script_load() {
        let resolver = RemoteResolver::new(
            versions(),
            Arc::new(HangingScripts),
            ContainerRegistry::new(),
            ResolverConfig::default().with_deadline(Duration::from_millis(20)),
        )
        .unwrap();

        let err = resolver.resolve(&descriptor()).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Timeout {
                component: "widgetA".to_string(),
                stage: RemoteState::LoadingScript,
            }
        );
        assert_eq!(resolver.state("widgetA"), RemoteState::LoadFailed);
    }

    #[tokio::test]
    async fn test_finished_load_leaves_in_flight_before_callers_resume() {
        let (resolver, _loader, versions) = setup(ResolverConfig::default());
        let d = descriptor();

        let mut caller = Box::pin(resolver.resolve(&d));
        assert!(futures::poll!(&mut caller).is_pending());

        let joined = resolver
            .inner
            .in_flight
            .lock()
            .unwrap()
            .get("widgetA")
            .cloned()
            .unwrap();

        // Drive the shared load to its failure without resuming `caller`.
        assert!(matches!(joined.await, Err(RemoteError::ScriptLoad { .. })));
        assert!(resolver.inner.in_flight.lock().unwrap().is_empty());

        // A caller arriving now starts over instead of reusing the failure.
        let late = resolver.resolve(&d).await;
        assert!(matches!(late, Err(RemoteError::ScriptLoad { .. })));
        assert_eq!(versions.fetches.load(Ordering::SeqCst), 2);

        assert!(matches!(caller.await, Err(RemoteError::ScriptLoad { .. })));
    }

    #[tokio::test]
    async fn test_resolve_entry_url_skips_loading() {
        let (resolver, loader, _) = setup(ResolverConfig::default());
        let url = resolver.resolve_entry_url(&descriptor()).await.unwrap();
        assert_eq!(url, ENTRY);
        assert_eq!(resolver.state("widgetA"), RemoteState::UrlBuilt);
        assert!(loader.head().is_empty());
    }

    #[test]
    fn test_state_classification() {
        assert!(RemoteState::Ready.is_terminal());
        assert!(!RemoteState::Ready.is_failure());
        assert!(RemoteState::LoadFailed.is_terminal());
        assert!(!RemoteState::LoadingScript.is_terminal());
        assert_eq!(RemoteState::AdaptingContainer.to_string(), "adapting_container");
    }
}
