//! Provider identifiers to typed exports.
//!
//! The embedding application builds a [`ProviderCatalog`] at startup, registering each provider
//! identifier (`@webstir-io/vitest-provider`, `./providers/test.js`, ...) with the [`ProviderModule`]
//! it stands for. A provider module is a set of typed exports; resolution picks the export that fits
//! the host instead of guessing at shapes.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::console::Console;
use crate::error::HostError;

use super::command::CommandProvider;
use super::{ModuleProvider, ProviderError, ProviderRegistry};

/// Zero-argument registry constructor.
pub type RegistryFactory = Arc<dyn Fn() -> Result<Arc<dyn ProviderRegistry>, ProviderError> + Send + Sync>;

/// Fallback for identifiers that were not registered up front.
pub type ModuleLoader = Arc<dyn Fn(&str) -> Option<ProviderModule> + Send + Sync>;

/// Conventional named export holding a ready registry.
pub const REGISTRY_EXPORT: &str = "registry";

/// Conventional registry factory names, tried in order.
pub const REGISTRY_FACTORY_EXPORTS: [&str; 2] = ["createProviderRegistry", "createDefaultProviderRegistry"];

/// One exported value of a provider module.
#[derive(Clone)]
pub enum Export {
    Registry(Arc<dyn ProviderRegistry>),
    RegistryFactory(RegistryFactory),
    Module(Arc<dyn ModuleProvider>),
}

impl Export {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ProviderRegistry>, ProviderError> + Send + Sync + 'static,
    {
        Export::RegistryFactory(Arc::new(factory))
    }

    fn kind(&self) -> &'static str {
        match self {
            Export::Registry(_) => "registry",
            Export::RegistryFactory(_) => "registry factory",
            Export::Module(_) => "module provider",
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// The exports of one provider identifier: an optional default export plus ordered named exports.
#[derive(Debug, Clone, Default)]
pub struct ProviderModule {
    default: Option<Export>,
    named: Vec<(String, Export)>,
}

impl ProviderModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, export: Export) -> Self {
        self.default = Some(export);
        self
    }

    /// Add a named export. Re-using a name replaces the earlier export in place.
    pub fn with_export(mut self, name: impl Into<String>, export: Export) -> Self {
        let name = name.into();
        match self.named.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = export,
            None => self.named.push((name, export)),
        }
        self
    }

    pub fn named(&self, name: &str) -> Option<&Export> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, export)| export)
    }

    /// Resolve the test host's registry.
    ///
    /// Order, first success wins:
    /// 1. a named `registry` export;
    /// 2. the `createProviderRegistry` / `createDefaultProviderRegistry` factories;
    /// 3. the default export, as a factory or as a registry.
    ///
    /// A default export that is an object carrying a factory method has no variant of its own: it is
    /// registered as [`Export::RegistryFactory`] wrapping that method, so step 3 covers it.
    ///
    /// A factory that fails aborts resolution with the failure wrapped in the provider identifier.
    pub fn resolve_registry(&self, provider_id: &str) -> Result<Arc<dyn ProviderRegistry>, HostError> {
        if let Some(Export::Registry(registry)) = self.named(REGISTRY_EXPORT) {
            return Ok(Arc::clone(registry));
        }

        let default_factory = match &self.default {
            Some(Export::RegistryFactory(factory)) => Some(factory),
            _ => None,
        };
        let factory = REGISTRY_FACTORY_EXPORTS
            .iter()
            .find_map(|name| match self.named(name) {
                Some(Export::RegistryFactory(factory)) => Some(factory),
                _ => None,
            })
            .or(default_factory);

        if let Some(factory) = factory {
            return factory().map_err(|source| HostError::ProviderInit {
                id: provider_id.to_string(),
                source,
            });
        }

        if let Some(Export::Registry(registry)) = &self.default {
            return Ok(Arc::clone(registry));
        }

        Err(HostError::UnresolvedRegistry(provider_id.to_string()))
    }

    /// Resolve the module host's build provider: the default export if it carries metadata,
    /// otherwise the first named export that does.
    pub fn resolve_module_provider(&self, provider_id: &str) -> Result<Arc<dyn ModuleProvider>, HostError> {
        let qualifies = |export: &Export| match export {
            Export::Module(provider) if provider.metadata().is_some() => Some(Arc::clone(provider)),
            _ => None,
        };

        self.default
            .as_ref()
            .and_then(qualifies)
            .or_else(|| self.named.iter().find_map(|(_, export)| qualifies(export)))
            .ok_or_else(|| HostError::NoModuleProvider(provider_id.to_string()))
    }
}

/// Provider identifiers known to the host application.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    modules: HashMap<String, ProviderModule>,
    fallback: Option<ModuleLoader>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, provider_id: impl Into<String>, module: ProviderModule) -> Self {
        self.modules.insert(provider_id.into(), module);
        self
    }

    /// Consult `loader` for identifiers that were not registered.
    pub fn with_fallback<F>(mut self, loader: F) -> Self
    where
        F: Fn(&str) -> Option<ProviderModule> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(loader));
        self
    }

    /// Treat unregistered identifiers naming an existing file as command providers.
    ///
    /// Relative identifiers resolve against the current directory, which the hosts set to the
    /// workspace root before loading.
    pub fn with_command_providers(self, console: Arc<dyn Console>) -> Self {
        self.with_fallback(move |provider_id| {
            let path = Path::new(provider_id);
            path.is_file()
                .then(|| CommandProvider::new(path, Arc::clone(&console)).into_module())
        })
    }

    /// Load the exports behind `provider_id`.
    pub fn load(&self, provider_id: &str) -> Result<ProviderModule, HostError> {
        if let Some(module) = self.modules.get(provider_id) {
            return Ok(module.clone());
        }
        self.fallback
            .as_ref()
            .and_then(|loader| loader(provider_id))
            .ok_or_else(|| HostError::ProviderNotFound(provider_id.to_string()))
    }

    pub fn load_registry(&self, provider_id: &str) -> Result<Arc<dyn ProviderRegistry>, HostError> {
        let registry = self.load(provider_id)?.resolve_registry(provider_id)?;
        tracing::debug!("resolved provider registry from '{}'", provider_id);
        Ok(registry)
    }

    pub fn load_module_provider(&self, provider_id: &str) -> Result<Arc<dyn ModuleProvider>, HostError> {
        let provider = self.load(provider_id)?.resolve_module_provider(provider_id)?;
        tracing::debug!("resolved module provider from '{}'", provider_id);
        Ok(provider)
    }
}

impl fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.modules.keys().collect();
        ids.sort();
        f.debug_struct("ProviderCatalog")
            .field("modules", &ids)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
