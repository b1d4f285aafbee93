//! CLI module for the Webstir hosts
//!
//! ## Hosts
//!
//! - `test_host` - `webstir-test-host --provider <module> --workspace <abs-path>`
//! - `module_host` - `webstir-module-host --provider <module> --workspace <abs-path> [--mode m]
//!   [--env K=V]... [--incremental true|false]`
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros. Every flag is optional at the clap level
//! so missing values produce the hosts' own messages (and exit status 1) instead of clap's usage error.
//! Host functions return `CliResult<ExitCode>` instead of calling `process::exit`. Only the top-level
//! `run()` functions print errors and exit.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod module_host;
pub mod test_host;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use clap::error::ErrorKind;

use crate::console::Output;
use crate::error::{HostError, render_error};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The entry point prints the message as plain,
/// unframed stderr text and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<HostError> for CliError {
    fn from(err: HostError) -> Self {
        CliError::failure(render_error(&err))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Shared helpers
// ============================================================================

/// Check the two required flags. The workspace must be absolute so the caller's working directory
/// never changes what gets built or tested.
pub fn validate_args(provider: Option<&str>, workspace: Option<&str>) -> Result<(String, PathBuf), HostError> {
    let provider = provider.filter(|p| !p.is_empty()).ok_or(HostError::MissingProvider)?;
    let workspace = workspace.filter(|w| !w.is_empty()).ok_or(HostError::MissingWorkspace)?;

    let path = PathBuf::from(workspace);
    if !path.is_absolute() {
        return Err(HostError::RelativeWorkspace(workspace.to_string()));
    }

    Ok((provider.to_string(), path))
}

/// Turn a host result into an exit code, writing any error as plain text to `stderr`.
pub fn finish(result: CliResult<ExitCode>, stderr: &Output) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            if !e.message.is_empty() {
                let _ = stderr.write_line(&e.message);
            }
            e.exit_code
        }
    }
}

/// Parse process arguments. Help and version exit 0; any other parse error prints clap's message and
/// exits 1, matching the hosts' argument-error status.
pub fn parse_args<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            process::exit(code.0);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_args_order() {
        assert!(matches!(validate_args(None, None), Err(HostError::MissingProvider)));
        assert!(matches!(validate_args(Some("p"), None), Err(HostError::MissingWorkspace)));
        assert!(matches!(
            validate_args(Some("p"), Some("site")),
            Err(HostError::RelativeWorkspace(ref w)) if w == "site"
        ));
        let (provider, workspace) = validate_args(Some("p"), Some("/srv/site")).unwrap();
        assert_eq!(provider, "p");
        assert_eq!(workspace, PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_finish_prints_plain_message() {
        let (stderr, captured) = Output::capture();
        let code = finish(Err(HostError::MissingProvider.into()), &stderr);
        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(captured.lines(), vec!["Missing required --provider <module> argument."]);

        let code = finish(Ok(ExitCode::SUCCESS), &stderr);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_finish_skips_empty_message() {
        let (stderr, captured) = Output::capture();
        let code = finish(Err(CliError::new("", ExitCode::FAILURE)), &stderr);
        assert_eq!(code, ExitCode::FAILURE);
        assert!(captured.contents().is_empty());
    }
}
