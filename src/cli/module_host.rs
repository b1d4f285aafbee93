//! Module host
//!
//! Loads one build provider, invokes it once and prints a single `WEBSTIR_MODULE_RESULT` line. There is
//! no run to tag failures with, so every error is plain stderr text and exit status 1.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::process;

use clap::Parser;
use serde_json::Value;
use webstir_protocol::ModuleResult;

use super::{CliError, CliResult, ExitCode, VERSION, finish, parse_args, validate_args};
use crate::console::FramedConsole;
use crate::error::HostError;
use crate::framer::EventWriter;
use crate::provider::{BuildOptions, ProviderCatalog};

/// Environment key carrying the requested build mode.
pub const MODE_ENV_KEY: &str = "WEBSTIR_MODULE_MODE";

/// Mode used when `--mode` is absent.
pub const DEFAULT_MODE: &str = "build";

/// Run a Webstir build provider once
#[derive(Parser, Debug, Default)]
#[command(name = "webstir-module-host")]
#[command(version = VERSION)]
#[command(about = "Run a Webstir build provider once", long_about = None)]
pub struct ModuleHostArgs {
    /// Provider module exporting a build provider
    #[arg(long, value_name = "MODULE")]
    pub provider: Option<String>,

    /// Absolute path to the workspace root
    #[arg(long, value_name = "PATH")]
    pub workspace: Option<String>,

    /// Build mode passed to the provider (case-insensitive)
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Environment entry for the provider, `KEY=VALUE` or bare `KEY` (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Request an incremental build (`true` enables it; any other value does not)
    #[arg(long, value_name = "BOOL")]
    pub incremental: Option<String>,
}

/// Split `--env` entries at the first `=`. A bare `KEY` maps to `None`; later entries win.
pub fn parse_env(entries: &[String]) -> BTreeMap<String, Option<String>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (entry.clone(), None),
        })
        .collect()
}

pub fn resolve_mode(mode: Option<&str>) -> String {
    mode.unwrap_or(DEFAULT_MODE).to_lowercase()
}

/// Options for the single build call. The mode key is injected after the `--env` entries, so it
/// overrides a user-supplied value of the same name.
pub fn build_options(args: &ModuleHostArgs, workspace: &Path) -> BuildOptions {
    let mut env = parse_env(&args.env);
    env.insert(MODE_ENV_KEY.to_string(), Some(resolve_mode(args.mode.as_deref())));
    BuildOptions {
        workspace_root: workspace.to_path_buf(),
        env,
        incremental: args.incremental.as_deref() == Some("true"),
    }
}

pub struct ModuleHost {
    catalog: ProviderCatalog,
    results: EventWriter,
}

impl ModuleHost {
    pub fn new(catalog: ProviderCatalog, results: EventWriter) -> Self {
        Self { catalog, results }
    }

    /// Validate arguments, enter the workspace, then build.
    pub async fn run(&self, args: &ModuleHostArgs) -> CliResult<ExitCode> {
        let (provider_id, workspace) = validate_args(args.provider.as_deref(), args.workspace.as_deref())?;
        env::set_current_dir(&workspace).map_err(|e| {
            CliError::failure(format!("Cannot enter workspace {}: {}", workspace.display(), e))
        })?;
        self.invoke(&provider_id, build_options(args, &workspace)).await?;
        Ok(ExitCode::SUCCESS)
    }

    /// Load the provider, build once and emit the result line.
    pub async fn invoke(&self, provider_id: &str, options: BuildOptions) -> Result<ModuleResult, HostError> {
        let provider = self.catalog.load_module_provider(provider_id)?;
        tracing::debug!(
            "building {} (incremental: {})",
            options.workspace_root.display(),
            options.incremental
        );

        let output = provider
            .build(options)
            .await
            .map_err(|source| HostError::Build { source })?;

        let result = ModuleResult {
            provider: provider.metadata().unwrap_or(Value::Null),
            manifest: output.manifest,
            artifacts: output.artifacts.unwrap_or_default(),
        };
        self.results.emit_module_result(&result)?;
        Ok(result)
    }
}

/// Module host entry point. This is the only place the module host exits the process.
pub async fn run(catalog: ProviderCatalog, console: &FramedConsole) {
    let args: ModuleHostArgs = parse_args();
    let host = ModuleHost::new(catalog, EventWriter::module_results(console.stdout().clone()));
    let code = finish(host.run(&args).await, console.stderr());
    process::exit(code.0);
}
