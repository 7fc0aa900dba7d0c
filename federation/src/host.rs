use crate::container::{AdaptedContainer, Module, RemoteContainer};
use crate::descriptor::RemoteMap;
use crate::error::{RemoteError, RemoteResult};
use crate::resolver::RemoteResolver;
use crate::share::ShareScope;
use tracing::debug;

/// The consuming side: resolves remotes on first use and hands out modules.
pub struct RemoteHost {
    resolver: RemoteResolver,
    remotes: RemoteMap,
    share_scope: ShareScope,
}

impl RemoteHost {
    pub fn new(resolver: RemoteResolver, remotes: RemoteMap, share_scope: ShareScope) -> Self {
        Self {
            resolver,
            remotes,
            share_scope,
        }
    }

    pub fn resolver(&self) -> &RemoteResolver {
        &self.resolver
    }

    pub fn share_scope(&self) -> &ShareScope {
        &self.share_scope
    }

    /// Resolves `component` and initializes it with the host's share scope.
    pub async fn container(&self, component: &str) -> RemoteResult<AdaptedContainer> {
        let descriptor = self
            .remotes
            .get(component)
            .ok_or_else(|| RemoteError::UnknownRemote {
                component: component.to_string(),
            })?;

        let container = self.resolver.resolve(descriptor).await?;
        container.init(Some(&self.share_scope)).await?;
        Ok(container)
    }

    /// `import("widgetA/App")`: resolves `widgetA`, then `get("./App")`.
    pub async fn import(&self, specifier: &str) -> RemoteResult<Module> {
        let (component, request) = split_specifier(specifier)?;
        debug!("Importing {} from remote {}", request, component);
        self.container(component).await?.get(&request).await
    }
}

fn split_specifier(specifier: &str) -> RemoteResult<(&str, String)> {
    match specifier.split_once('/') {
        Some((component, exposed)) if !component.is_empty() && !exposed.is_empty() => {
            Ok((component, format!("./{}", exposed)))
        }
        _ => Err(RemoteError::InvalidConfig {
            message: format!(
                "remote import '{}' must look like <component>/<exposed module>",
                specifier
            ),
        }),
    }
}
