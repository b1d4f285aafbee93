//! Provider capability interfaces
//!
//! Providers are supplied by the application that embeds the hosts. The hosts never construct one;
//! they resolve them from a [`ProviderCatalog`] and call them:
//!
//! - [`TestProvider`]: runs a batch of compiled test files for one runtime.
//! - [`ProviderRegistry`]: `get(runtime)` lookup of test providers.
//! - [`ModuleProvider`]: a build provider invoked once by the module host.

pub mod catalog;
pub mod command;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webstir_protocol::{RunSummary, Runtime};

pub use catalog::{Export, ProviderCatalog, ProviderModule, RegistryFactory};

/// Error type returned by provider code.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// Test providers
// ============================================================================

#[async_trait]
pub trait TestProvider: Send + Sync {
    /// Run every file in `files` (absolute compiled paths) and report the aggregate.
    async fn run_tests(&self, files: &[PathBuf]) -> Result<RunSummary, ProviderError>;
}

pub trait ProviderRegistry: Send + Sync {
    fn get(&self, runtime: Runtime) -> Option<Arc<dyn TestProvider>>;
}

/// Map-backed registry.
#[derive(Default, Clone)]
pub struct StaticRegistry {
    providers: BTreeMap<Runtime, Arc<dyn TestProvider>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, runtime: Runtime, provider: Arc<dyn TestProvider>) -> Self {
        self.providers.insert(runtime, provider);
        self
    }
}

impl ProviderRegistry for StaticRegistry {
    fn get(&self, runtime: Runtime) -> Option<Arc<dyn TestProvider>> {
        self.providers.get(&runtime).cloned()
    }
}

impl fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRegistry")
            .field("runtimes", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Build providers
// ============================================================================

/// Arguments to [`ModuleProvider::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub workspace_root: PathBuf,
    /// `--env KEY=VALUE` entries; a bare `--env KEY` maps to `None`.
    pub env: BTreeMap<String, Option<String>>,
    pub incremental: bool,
}

/// What a build produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub manifest: Value,
    #[serde(default)]
    pub artifacts: Option<Vec<Value>>,
}

#[async_trait]
pub trait ModuleProvider: Send + Sync {
    /// Identifying data reported alongside the build result.
    ///
    /// `None` means this export does not carry build capability metadata and is not selectable.
    fn metadata(&self) -> Option<Value>;

    async fn build(&self, options: BuildOptions) -> Result<BuildOutput, ProviderError>;
}
