//! Remote entry script loading.
//!
//! A load attempt always "injects" a new script element, even for a URL that
//! was loaded before; elements are recorded and never removed. Running the
//! script is expected to register a container in the [`ContainerRegistry`].

use crate::container::ContainerRegistry;
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Resolves once the script reported `load`, fails on `error`.
    async fn load(&self, url: &str) -> RemoteResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub src: String,
    pub is_async: bool,
}

impl ScriptElement {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            is_async: true,
        }
    }
}

/// The list of script elements appended so far, in order.
#[derive(Debug, Clone, Default)]
pub struct DocumentHead {
    scripts: Arc<Mutex<Vec<ScriptElement>>>,
}

impl DocumentHead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, element: ScriptElement) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(element);
    }

    pub fn scripts(&self) -> Vec<ScriptElement> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a downloaded entry script.
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        url: &str,
        source: &[u8],
        registry: &ContainerRegistry,
    ) -> RemoteResult<()>;
}

/// Downloads entry scripts over HTTP and hands them to a [`ScriptEvaluator`].
pub struct HttpScriptLoader {
    client: reqwest::Client,
    evaluator: Arc<dyn ScriptEvaluator>,
    registry: ContainerRegistry,
    head: DocumentHead,
}

impl HttpScriptLoader {
    pub fn new(
        evaluator: Arc<dyn ScriptEvaluator>,
        registry: ContainerRegistry,
    ) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            evaluator,
            registry,
            head: DocumentHead::new(),
        })
    }

    pub fn head(&self) -> &DocumentHead {
        &self.head
    }

    async fn download(&self, url: &str) -> RemoteResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::ScriptLoad {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::ScriptLoad {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.bytes().await.map_err(|e| RemoteError::ScriptLoad {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl ScriptLoader for HttpScriptLoader {
    async fn load(&self, url: &str) -> RemoteResult<()> {
        debug!("Loading remoteEntry from: {}", url);
        self.head.append(ScriptElement::new(url));

        let source = self.download(url).await.map_err(|e| {
            error!("{}", e);
            e
        })?;

        // A script that throws while running still fires `load`.
        if let Err(e) = self.evaluator.evaluate(url, &source, &self.registry).await {
            warn!("Remote entry {} raised while evaluating: {}", url, e);
        }

        Ok(())
    }
}

type Installer = Arc<dyn Fn(&ContainerRegistry) + Send + Sync>;

/// Serves entry scripts from in-process installers keyed by URL.
///
/// Suited to remotes linked into the host binary and to tests. A URL with
/// no installer fails the way a 404 would.
#[derive(Clone, Default)]
pub struct InProcessScriptLoader {
    installers: Arc<Mutex<HashMap<String, Installer>>>,
    registry: ContainerRegistry,
    head: DocumentHead,
}

impl InProcessScriptLoader {
    pub fn new(registry: ContainerRegistry) -> Self {
        Self {
            installers: Arc::default(),
            registry,
            head: DocumentHead::new(),
        }
    }

    pub fn serve<F>(&self, url: impl Into<String>, installer: F)
    where
        F: Fn(&ContainerRegistry) + Send + Sync + 'static,
    {
        self.installers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Arc::new(installer));
    }

    pub fn head(&self) -> &DocumentHead {
        &self.head
    }
}

#[async_trait]
impl ScriptLoader for InProcessScriptLoader {
    async fn load(&self, url: &str) -> RemoteResult<()> {
        debug!("Loading remoteEntry from: {}", url);
        self.head.append(ScriptElement::new(url));

        let installer = self
            .installers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned();

        match installer {
            Some(install) => {
                install(&self.registry);
                Ok(())
            }
            None => Err(RemoteError::ScriptLoad {
                url: url.to_string(),
                message: "no script served at this address".to_string(),
            }),
        }
    }
}
