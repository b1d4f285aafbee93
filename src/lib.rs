#![forbid(unsafe_code)]
//! Webstir test and module hosts
//!
//! Two small processes that run third-party providers on behalf of a supervising parent and report
//! what happened as a line-oriented event stream:
//!
//! - the **test host** discovers test modules, dispatches them per runtime to test providers and
//!   streams `WEBSTIR_TEST` events with pass/fail summaries;
//! - the **module host** loads one build provider, invokes it once and prints a single
//!   `WEBSTIR_MODULE_RESULT` payload.
//!
//! Both hosts route every console/tracing line through [`console::FramedConsole`] so ordinary output
//! survives verbatim while a wrapped copy reaches the parent on stderr.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod console;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod provider;

pub use webstir_protocol as protocol;

pub use console::{Console, FramedConsole, Output};
pub use error::{HostError, error_stack};
pub use provider::{
    BuildOptions, BuildOutput, Export, ModuleProvider, ProviderCatalog, ProviderError, ProviderModule,
    ProviderRegistry, StaticRegistry, TestProvider,
};
