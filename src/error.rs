//! Host error taxonomy.
//!
//! Argument and resolution errors abort before any run is established and are printed as plain stderr
//! text. Everything that escapes the dispatch loop becomes a structured `error` event instead.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::io;

use thiserror::Error;
use webstir_protocol::{FrameError, Runtime};

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Missing required --provider <module> argument.")]
    MissingProvider,

    #[error("Missing required --workspace <path> argument.")]
    MissingWorkspace,

    #[error("Workspace must be an absolute path (received: {0}).")]
    RelativeWorkspace(String),

    #[error("Cannot find provider module '{0}'.")]
    ProviderNotFound(String),

    #[error("Unable to resolve provider registry from '{0}'.")]
    UnresolvedRegistry(String),

    #[error("Failed to initialize provider '{id}': {source}")]
    ProviderInit {
        id: String,
        #[source]
        source: ProviderError,
    },

    #[error("No module provider exported by {0}.")]
    NoModuleProvider(String),

    #[error("{runtime} test provider failed: {source}")]
    TestRun {
        runtime: Runtime,
        #[source]
        source: ProviderError,
    },

    #[error("Build failed: {source}")]
    Build {
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Render the `source()` chain below `err`, or `None` when there is no underlying cause.
///
/// This is the closest Rust analogue to a stack trace for a boxed provider failure.
pub fn error_stack(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut source = err.source()?;
    let mut rendered = String::from("Caused by:");
    let mut depth = 0;
    loop {
        let _ = write!(rendered, "\n    {depth}: {source}");
        depth += 1;
        match source.source() {
            Some(next) => source = next,
            None => break,
        }
    }
    Some(rendered)
}

/// `message` followed by the cause chain, one block of plain text.
pub fn render_error(err: &(dyn StdError + 'static)) -> String {
    match error_stack(err) {
        Some(stack) => format!("{err}\n{stack}"),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_error_messages() {
        assert_eq!(
            HostError::RelativeWorkspace("site".into()).to_string(),
            "Workspace must be an absolute path (received: site)."
        );
    }

    #[test]
    fn test_error_stack_walks_sources() {
        let inner = io::Error::other("disk on fire");
        let err = HostError::ProviderInit {
            id: "@webstir/testing".into(),
            source: Box::new(inner),
        };
        assert_eq!(
            err.to_string(),
            "Failed to initialize provider '@webstir/testing': disk on fire"
        );
        let stack = error_stack(&err).unwrap();
        assert_eq!(stack, "Caused by:\n    0: disk on fire");
    }

    #[test]
    fn test_error_stack_none_without_source() {
        assert!(error_stack(&HostError::MissingWorkspace).is_none());
        assert_eq!(
            render_error(&HostError::MissingWorkspace),
            "Missing required --workspace <path> argument."
        );
    }
}
