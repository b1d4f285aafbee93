//! Provide the wire vocabulary shared by the Webstir hosts and the processes that supervise them.
//!
//! The hosts talk to their parent over two standard streams. Every structured line is a fixed prefix
//! followed by one JSON object; every other line is ordinary passthrough output. This crate owns:
//! - the data model carried by those lines (manifest, summaries, events), and
//! - the frame codec that turns a payload into a line and a line back into a typed [`frame::Frame`].
//!
//! ## Notes
//!
//! - This crate does **no IO**. Writing lines to a stream is the hosts' concern.
//! - Events are a closed set of kinds so consumers get exhaustiveness checking.

pub mod console;
pub mod event;
pub mod frame;
pub mod manifest;
pub mod summary;

pub use console::{ConsoleEvent, ConsoleLevel};
pub use event::{Event, LogLevel, ModuleResult, RunId, SummaryScope};
pub use frame::{Frame, FrameError};
pub use manifest::{Runtime, TestManifest, TestModule};
pub use summary::{RunSummary, TestOutcome};

/// Prefix for the test host's own protocol events on stdout.
pub const TEST_EVENT_PREFIX: &str = "WEBSTIR_TEST ";

/// Prefix for the module host's single result payload on stdout.
pub const MODULE_RESULT_PREFIX: &str = "WEBSTIR_MODULE_RESULT ";

/// Prefix for wrapped console output on stderr, shared by both hosts.
pub const MODULE_EVENT_PREFIX: &str = "WEBSTIR_MODULE_EVENT ";
