//! Providers backed by an external executable.
//!
//! Lets the stock binaries drive a provider that lives outside this process:
//!
//! - tests: `<cmd> test <runtime> <file>...`
//! - builds: `<cmd> build`, with [`BuildOptions`] as JSON on stdin
//!
//! The last non-empty stdout line is the JSON payload (a `RunSummary`, or `{manifest, artifacts?}`).
//! Earlier stdout lines are forwarded through the console as `log` output; stderr is inherited.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use webstir_protocol::{RunSummary, Runtime};

use crate::console::Console;

use super::catalog::{Export, ProviderModule, REGISTRY_EXPORT};
use super::{BuildOptions, BuildOutput, ModuleProvider, ProviderError, ProviderRegistry, TestProvider};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status} without a result")]
    Exit { program: String, status: ExitStatus },

    #[error("{program} printed no result")]
    MissingPayload { program: String },

    #[error("{program} printed a malformed result: {source}")]
    Payload {
        program: String,
        #[source]
        source: serde_json::Error,
    },
}

struct CommandTarget {
    program: PathBuf,
    console: Arc<dyn Console>,
}

impl CommandTarget {
    fn display_name(&self) -> String {
        self.program.display().to_string()
    }

    async fn invoke<T: DeserializeOwned>(&self, args: Vec<OsString>, stdin: Option<Vec<u8>>) -> Result<T, CommandError> {
        let spawn_error = |source| CommandError::Spawn {
            program: self.display_name(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        // Stdin is fed while output is collected, so a child that writes before reading cannot block.
        // Dropping the pipe at the end of `feed` closes the child's stdin.
        let pipe = child.stdin.take();
        let feed = async move {
            let (Some(bytes), Some(mut pipe)) = (stdin, pipe) else {
                return Ok::<(), io::Error>(());
            };
            match pipe.write_all(&bytes).await {
                // A child may exit or close stdin without reading its input; its output still decides.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(spawn_error)?;
        fed.map_err(spawn_error)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines: Vec<&str> = stdout.lines().filter(|line| !line.trim().is_empty()).collect();
        let payload = lines.pop();
        for line in lines {
            self.console.log(line);
        }

        let Some(payload) = payload else {
            return Err(if output.status.success() {
                CommandError::MissingPayload {
                    program: self.display_name(),
                }
            } else {
                CommandError::Exit {
                    program: self.display_name(),
                    status: output.status,
                }
            });
        };

        serde_json::from_str(payload).map_err(|source| {
            if output.status.success() {
                CommandError::Payload {
                    program: self.display_name(),
                    source,
                }
            } else {
                CommandError::Exit {
                    program: self.display_name(),
                    status: output.status,
                }
            }
        })
    }
}

/// An executable acting as both a test registry and a build provider.
#[derive(Clone)]
pub struct CommandProvider {
    target: Arc<CommandTarget>,
}

impl CommandProvider {
    pub fn new(program: impl AsRef<Path>, console: Arc<dyn Console>) -> Self {
        Self {
            target: Arc::new(CommandTarget {
                program: program.as_ref().to_path_buf(),
                console,
            }),
        }
    }

    /// Exports: `registry` for the test host, the default export for the module host.
    pub fn into_module(self) -> ProviderModule {
        let provider = Arc::new(self);
        ProviderModule::new()
            .with_export(REGISTRY_EXPORT, Export::Registry(provider.clone()))
            .with_default(Export::Module(provider))
    }
}

impl ProviderRegistry for CommandProvider {
    fn get(&self, runtime: Runtime) -> Option<Arc<dyn TestProvider>> {
        Some(Arc::new(CommandTestProvider {
            target: Arc::clone(&self.target),
            runtime,
        }))
    }
}

#[async_trait]
impl ModuleProvider for CommandProvider {
    fn metadata(&self) -> Option<Value> {
        let name = self
            .target
            .program
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(json!({
            "name": name,
            "command": self.target.display_name(),
        }))
    }

    async fn build(&self, options: BuildOptions) -> Result<BuildOutput, ProviderError> {
        let input = serde_json::to_vec(&options)?;
        let output = self.target.invoke::<BuildOutput>(vec![OsString::from("build")], Some(input)).await?;
        Ok(output)
    }
}

struct CommandTestProvider {
    target: Arc<CommandTarget>,
    runtime: Runtime,
}

#[async_trait]
impl TestProvider for CommandTestProvider {
    async fn run_tests(&self, files: &[PathBuf]) -> Result<RunSummary, ProviderError> {
        let mut args = vec![OsString::from("test"), OsString::from(self.runtime.as_str())];
        args.extend(files.iter().map(|file| file.as_os_str().to_os_string()));
        let summary = self.target.invoke::<RunSummary>(args, None).await?;
        Ok(summary)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::console::{FramedConsole, Output};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("provider.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_command_test_provider_parses_last_line() {
        let dir = TempDir::new().unwrap();
        let program = script(
            &dir,
            r#"echo "running $2"
printf '{"passed":1,"failed":0,"total":1,"durationMs":1.4,"results":[{"file":"%s"}]}\n' "$3""#,
        );
        let (stdout, out) = Output::capture();
        let (stderr, _err) = Output::capture();
        let provider = CommandProvider::new(&program, Arc::new(FramedConsole::new(stdout, stderr)));

        let test_provider = provider.get(Runtime::Backend).unwrap();
        let summary = test_provider
            .run_tests(&[PathBuf::from("/ws/build/backend/tests/a.test.js")])
            .await
            .unwrap();

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.duration_ms, 1);
        assert_eq!(summary.results[0].file, PathBuf::from("/ws/build/backend/tests/a.test.js"));
        assert_eq!(out.lines(), vec!["running backend"]);
    }

    #[tokio::test]
    async fn test_command_build_receives_options_on_stdin() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, r#"input=$(cat); printf '{"manifest":%s}\n' "$input""#);
        let (stdout, _out) = Output::capture();
        let (stderr, _err) = Output::capture();
        let provider = CommandProvider::new(&program, Arc::new(FramedConsole::new(stdout, stderr)));

        assert_eq!(provider.metadata().unwrap()["name"], "provider");

        let output = provider
            .build(BuildOptions {
                workspace_root: PathBuf::from("/ws"),
                env: Default::default(),
                incremental: true,
            })
            .await
            .unwrap();
        assert_eq!(output.manifest["incremental"], true);
        assert!(output.artifacts.is_none());
    }

    #[tokio::test]
    async fn test_build_succeeds_when_child_closes_stdin() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "exec 0<&-\necho '{\"manifest\":{\"entry\":\"app.js\"}}'");
        let (stdout, _out) = Output::capture();
        let (stderr, _err) = Output::capture();
        let provider = CommandProvider::new(&program, Arc::new(FramedConsole::new(stdout, stderr)));

        // The child exiting before its input is written is a race; repeat to make it likely.
        for _ in 0..20 {
            let output = provider
                .build(BuildOptions {
                    workspace_root: PathBuf::from("/ws"),
                    env: Default::default(),
                    incremental: false,
                })
                .await
                .unwrap();
            assert_eq!(output.manifest["entry"], "app.js");
        }
    }

    #[tokio::test]
    async fn test_command_failure_without_payload() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "exit 3");
        let (stdout, _out) = Output::capture();
        let (stderr, _err) = Output::capture();
        let provider = CommandProvider::new(&program, Arc::new(FramedConsole::new(stdout, stderr)));

        let err = provider.get(Runtime::Frontend).unwrap().run_tests(&[]).await.unwrap_err();
        assert!(err.to_string().contains("without a result"), "{err}");
    }
}
