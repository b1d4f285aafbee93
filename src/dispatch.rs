//! Runtime dispatch
//!
//! Groups the manifest's modules by runtime, hands each group to that runtime's provider, and streams
//! `result` / `summary` events while folding every group into one aggregate.
//!
//! Groups are processed one at a time, in order of first appearance in the manifest. A runtime with no
//! registered provider is skipped with a warning; the other groups still run.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use webstir_protocol::{Event, RunId, RunSummary, Runtime, TestManifest, TestModule};

use crate::error::HostError;
use crate::framer::EventWriter;
use crate::provider::{ProviderRegistry, TestProvider};

/// Environment variable restricting a run to one runtime.
pub const RUNTIME_FILTER_ENV: &str = "WEBSTIR_TEST_RUNTIME";

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

// ============================================================================
// Runtime filter
// ============================================================================

/// `frontend` / `backend` (any case, surrounding whitespace ignored) select a runtime; anything else,
/// including `all` and absence, disables filtering.
pub fn normalize_runtime_filter(value: Option<&str>) -> Option<Runtime> {
    let normalized = value?.trim().to_lowercase();
    normalized.parse().ok()
}

pub fn apply_runtime_filter(manifest: &TestManifest, runtime: Option<Runtime>) -> TestManifest {
    match runtime {
        Some(runtime) => manifest.retain_runtime(runtime),
        None => manifest.clone(),
    }
}

pub fn runtime_filter_message(runtime: Runtime, before: usize, after: usize) -> String {
    let skipped = before.saturating_sub(after);
    format!(
        "Runtime filter '{}' matched {} test{} ({} skipped).",
        runtime,
        after,
        plural(after),
        skipped
    )
}

// ============================================================================
// Grouping
// ============================================================================

/// Partition by runtime, keeping each group's relative order and the order groups first appear.
pub fn group_by_runtime(modules: &[TestModule]) -> Vec<(Runtime, Vec<&TestModule>)> {
    let mut groups: Vec<(Runtime, Vec<&TestModule>)> = Vec::new();
    for module in modules {
        match groups.iter_mut().find(|(runtime, _)| *runtime == module.runtime) {
            Some((_, group)) => group.push(module),
            None => groups.push((module.runtime, vec![module])),
        }
    }
    groups
}

/// Absolute, lexically normalized form of `path` (relative paths resolve against `base`).
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct Dispatcher<'a> {
    run_id: &'a RunId,
    events: &'a EventWriter,
    registry: &'a dyn ProviderRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(run_id: &'a RunId, events: &'a EventWriter, registry: &'a dyn ProviderRegistry) -> Self {
        Self {
            run_id,
            events,
            registry,
        }
    }

    /// Run every runtime group and return the folded aggregate.
    ///
    /// The per-runtime `summary` events are emitted here; the final `all` summary is the caller's.
    pub async fn execute_run(&self, manifest: &TestManifest) -> Result<RunSummary, HostError> {
        let mut aggregate = RunSummary::empty();

        for (runtime, modules) in group_by_runtime(&manifest.modules) {
            let Some(provider) = self.registry.get(runtime) else {
                self.events.emit(&Event::warn(
                    self.run_id,
                    format!(
                        "Skipping {} test{} for unsupported runtime '{}'.",
                        modules.len(),
                        plural(modules.len()),
                        runtime
                    ),
                ))?;
                continue;
            };

            let summary = self
                .run_with_provider(&manifest.workspace_root, runtime, &modules, provider.as_ref())
                .await?;
            aggregate = aggregate.merge(summary);
        }

        Ok(aggregate)
    }

    async fn run_with_provider(
        &self,
        workspace_root: &Path,
        runtime: Runtime,
        modules: &[&TestModule],
        provider: &dyn TestProvider,
    ) -> Result<RunSummary, HostError> {
        let mut files = Vec::with_capacity(modules.len());
        let mut module_by_path: HashMap<PathBuf, &TestModule> = HashMap::with_capacity(modules.len());

        for module in modules {
            let Some(compiled) = module.compiled_path.as_deref() else {
                self.events.emit(&Event::warn(
                    self.run_id,
                    format!("Test {} has no compiled output; skipping.", module.id),
                ))?;
                continue;
            };
            let absolute = resolve_path(workspace_root, compiled);
            module_by_path.insert(absolute.clone(), *module);
            files.push(absolute);
        }

        if files.is_empty() {
            let empty = RunSummary::empty();
            self.events.emit(&Event::summary(self.run_id, runtime, empty.clone()))?;
            return Ok(empty);
        }

        tracing::debug!("running {} {} test file(s)", files.len(), runtime);
        let summary = provider
            .run_tests(&files)
            .await
            .map_err(|source| HostError::TestRun { runtime, source })?;

        for result in &summary.results {
            let absolute = resolve_path(workspace_root, &result.file);
            let module_id = match module_by_path.get(&absolute) {
                Some(module) => module.id.clone(),
                None => {
                    tracing::warn!(
                        "{} provider reported a result for {}, which was not dispatched",
                        runtime,
                        absolute.display()
                    );
                    absolute.display().to_string()
                }
            };
            self.events.emit(&Event::Result {
                run_id: self.run_id.clone(),
                runtime,
                module_id,
                result: result.clone(),
            })?;
        }

        self.events.emit(&Event::summary(self.run_id, runtime, summary.clone()))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Output;
    use crate::provider::{ProviderError, StaticRegistry};
    use async_trait::async_trait;
    use std::sync::Arc;
    use webstir_protocol::SummaryScope;
    use webstir_protocol::frame::{Frame, parse_line};

    struct Unreachable;

    #[async_trait]
    impl TestProvider for Unreachable {
        async fn run_tests(&self, files: &[PathBuf]) -> Result<RunSummary, ProviderError> {
            panic!("provider called with {files:?}");
        }
    }

    fn module(id: &str, runtime: Runtime) -> TestModule {
        TestModule {
            id: id.to_string(),
            runtime,
            source_path: PathBuf::from("/ws/src").join(id),
            compiled_path: Some(PathBuf::from("/ws/build").join(id).with_extension("js")),
        }
    }

    fn manifest(frontend: usize, backend: usize) -> TestManifest {
        let mut modules = Vec::new();
        for i in 0..frontend {
            modules.push(module(&format!("frontend/tests/f{i}.test.ts"), Runtime::Frontend));
        }
        for i in 0..backend {
            modules.push(module(&format!("backend/tests/b{i}.test.ts"), Runtime::Backend));
        }
        TestManifest::new("/ws", modules)
    }

    #[test]
    fn test_normalize_runtime_filter() {
        assert_eq!(normalize_runtime_filter(Some(" Backend ")), Some(Runtime::Backend));
        assert_eq!(normalize_runtime_filter(Some("frontend")), Some(Runtime::Frontend));
        assert_eq!(normalize_runtime_filter(Some("all")), None);
        assert_eq!(normalize_runtime_filter(Some("")), None);
        assert_eq!(normalize_runtime_filter(Some("mobile")), None);
        assert_eq!(normalize_runtime_filter(None), None);
    }

    #[test]
    fn test_filter_backend_counts() {
        let full = manifest(3, 2);
        let filtered = apply_runtime_filter(&full, Some(Runtime::Backend));
        assert_eq!(filtered.modules.len(), 2);
        assert_eq!(
            runtime_filter_message(Runtime::Backend, full.modules.len(), filtered.modules.len()),
            "Runtime filter 'backend' matched 2 tests (3 skipped)."
        );
        assert_eq!(
            runtime_filter_message(Runtime::Frontend, 4, 1),
            "Runtime filter 'frontend' matched 1 test (3 skipped)."
        );
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let full = manifest(1, 1);
        assert_eq!(apply_runtime_filter(&full, None), full);
    }

    #[test]
    fn test_group_by_runtime_preserves_order() {
        let modules = vec![
            module("backend/tests/a.test.ts", Runtime::Backend),
            module("frontend/tests/a.test.ts", Runtime::Frontend),
            module("backend/tests/b.test.ts", Runtime::Backend),
        ];
        let groups = group_by_runtime(&modules);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Runtime::Backend);
        let ids: Vec<&str> = groups[0].1.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["backend/tests/a.test.ts", "backend/tests/b.test.ts"]);
        assert_eq!(groups[1].0, Runtime::Frontend);
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/ws");
        assert_eq!(resolve_path(base, Path::new("build/a.js")), PathBuf::from("/ws/build/a.js"));
        assert_eq!(resolve_path(base, Path::new("./build/../build/a.js")), PathBuf::from("/ws/build/a.js"));
        assert_eq!(resolve_path(base, Path::new("/other/a.js")), PathBuf::from("/other/a.js"));
    }

    #[tokio::test]
    async fn test_modules_without_compiled_output_never_reach_provider() {
        let mut uncompiled = module("frontend/tests/a.test.ts", Runtime::Frontend);
        uncompiled.compiled_path = None;
        let manifest = TestManifest::new("/ws", vec![uncompiled]);

        let (out, captured) = Output::capture();
        let events = EventWriter::test_events(out);
        let registry = StaticRegistry::new().with(Runtime::Frontend, Arc::new(Unreachable));
        let run_id = RunId::new("run-1");

        let aggregate = Dispatcher::new(&run_id, &events, &registry)
            .execute_run(&manifest)
            .await
            .unwrap();
        assert_eq!(aggregate, RunSummary::empty());

        let emitted: Vec<Event> = captured
            .lines()
            .iter()
            .map(|line| match parse_line(line).unwrap() {
                Frame::Test(event) => event,
                other => panic!("unexpected frame {other:?}"),
            })
            .collect();
        assert_eq!(
            emitted,
            vec![
                Event::warn(&run_id, "Test frontend/tests/a.test.ts has no compiled output; skipping."),
                Event::summary(&run_id, SummaryScope::Frontend, RunSummary::empty()),
            ]
        );
    }
}
