//! Test host
//!
//! Discovers test modules under `<workspace>/src/**/tests/`, dispatches them per runtime to the
//! providers of a resolved registry, and streams `WEBSTIR_TEST` events on stdout:
//!
//! `log`(filter)? → `start` → (`log` | `result`* `summary`)* per runtime → `summary`(`all`)
//!
//! Argument and registry errors happen before a run exists and are printed as plain stderr text. Any
//! error after that becomes an `error` event; summaries already emitted stay valid.

use std::env;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use webstir_protocol::{Event, RunId, RunSummary, Runtime, SummaryScope};

use super::{CliError, CliResult, ExitCode, VERSION, finish, parse_args, validate_args};
use crate::console::FramedConsole;
use crate::discovery::discover_test_manifest;
use crate::dispatch::{
    Dispatcher, RUNTIME_FILTER_ENV, apply_runtime_filter, normalize_runtime_filter, runtime_filter_message,
};
use crate::error::{HostError, error_stack};
use crate::framer::EventWriter;
use crate::provider::{ProviderCatalog, ProviderRegistry};

/// Run Webstir test providers for a workspace
#[derive(Parser, Debug, Default)]
#[command(name = "webstir-test-host")]
#[command(version = VERSION)]
#[command(about = "Run Webstir test providers for a workspace", long_about = None)]
pub struct TestHostArgs {
    /// Provider module resolving to a test provider registry
    #[arg(long, value_name = "MODULE")]
    pub provider: Option<String>,

    /// Absolute path to the workspace root
    #[arg(long, value_name = "PATH")]
    pub workspace: Option<String>,
}

/// `<base36 millis>-<6 random chars>`; only needs to tell concurrent runs apart.
pub fn generate_run_id() -> RunId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let random = uuid::Uuid::new_v4().simple().to_string();
    RunId::new(format!("{}-{}", to_base36(millis), &random[..6]))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

pub struct TestHost {
    catalog: ProviderCatalog,
    events: EventWriter,
    runtime_filter: Option<Runtime>,
}

impl TestHost {
    pub fn new(catalog: ProviderCatalog, events: EventWriter) -> Self {
        Self {
            catalog,
            events,
            runtime_filter: None,
        }
    }

    pub fn with_runtime_filter(mut self, runtime_filter: Option<Runtime>) -> Self {
        self.runtime_filter = runtime_filter;
        self
    }

    /// Validate arguments, enter the workspace, then run.
    pub async fn run(&self, args: &TestHostArgs) -> CliResult<ExitCode> {
        let (provider_id, workspace) = validate_args(args.provider.as_deref(), args.workspace.as_deref())?;
        env::set_current_dir(&workspace).map_err(|e| {
            CliError::failure(format!("Cannot enter workspace {}: {}", workspace.display(), e))
        })?;
        self.run_in(&provider_id, &workspace).await
    }

    /// Run against `workspace` without touching the process's working directory.
    pub async fn run_in(&self, provider_id: &str, workspace: &Path) -> CliResult<ExitCode> {
        let registry = self.catalog.load_registry(provider_id)?;
        let run_id = generate_run_id();
        tracing::debug!("starting test run {}", run_id);

        match self.execute(&run_id, workspace, registry.as_ref()).await {
            Ok(code) => Ok(code),
            Err(err) => {
                self.events.emit(&Event::Error {
                    run_id,
                    message: err.to_string(),
                    stack: error_stack(&err),
                })?;
                Ok(ExitCode::FAILURE)
            }
        }
    }

    async fn execute(
        &self,
        run_id: &RunId,
        workspace: &Path,
        registry: &dyn ProviderRegistry,
    ) -> Result<ExitCode, HostError> {
        let manifest = discover_test_manifest(workspace);
        let filtered = apply_runtime_filter(&manifest, self.runtime_filter);
        if let Some(runtime) = self.runtime_filter {
            self.events.emit(&Event::info(
                run_id,
                runtime_filter_message(runtime, manifest.modules.len(), filtered.modules.len()),
            ))?;
        }

        self.events.emit(&Event::Start {
            run_id: run_id.clone(),
            manifest: filtered.clone(),
        })?;

        if filtered.is_empty() {
            self.events
                .emit(&Event::info(run_id, "No tests found under src/**/tests/."))?;
            self.events
                .emit(&Event::summary(run_id, SummaryScope::All, RunSummary::empty()))?;
            return Ok(ExitCode::SUCCESS);
        }

        let summary = Dispatcher::new(run_id, &self.events, registry)
            .execute_run(&filtered)
            .await?;
        let code = if summary.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
        self.events.emit(&Event::summary(run_id, SummaryScope::All, summary))?;
        Ok(code)
    }
}

/// Test host entry point. This is the only place the test host exits the process.
pub async fn run(catalog: ProviderCatalog, console: &FramedConsole) {
    let args: TestHostArgs = parse_args();
    let runtime_filter = normalize_runtime_filter(env::var(RUNTIME_FILTER_ENV).ok().as_deref());

    let host = TestHost::new(catalog, EventWriter::test_events(console.stdout().clone()))
        .with_runtime_filter(runtime_filter);
    let code = finish(host.run(&args).await, console.stderr());
    process::exit(code.0);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::console::Output;

    #[test]
    fn test_cli_parse_flags() {
        let args =
            TestHostArgs::try_parse_from(["webstir-test-host", "--provider", "@webstir/t", "--workspace", "/ws"])
                .unwrap();
        assert_eq!(args.provider.as_deref(), Some("@webstir/t"));
        assert_eq!(args.workspace.as_deref(), Some("/ws"));
    }

    #[test]
    fn test_cli_flags_are_optional_for_clap() {
        let args = TestHostArgs::try_parse_from(["webstir-test-host"]).unwrap();
        assert!(args.provider.is_none());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_run_id_shape() {
        let run_id = generate_run_id();
        let (time, random) = run_id.as_str().split_once('-').unwrap();
        assert!(!time.is_empty());
        assert_eq!(random.len(), 6);
        assert!(random.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_relative_workspace_is_plain_error() {
        let (stdout, events) = Output::capture();
        let host = TestHost::new(ProviderCatalog::new(), EventWriter::test_events(stdout));
        let args = TestHostArgs {
            provider: Some("p".into()),
            workspace: Some("site".into()),
        };
        let err = host.run(&args).await.unwrap_err();
        assert_eq!(err.message, "Workspace must be an absolute path (received: site).");
        assert!(events.contents().is_empty());
    }
}
