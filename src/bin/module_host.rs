//! Webstir module host binary entry point
//!
//! Run with: webstir-module-host --provider <module> --workspace <abs-path>

use std::sync::Arc;

use webstir_host::console::tracing_writer::init_tracing;
use webstir_host::{FramedConsole, ProviderCatalog};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let console = Arc::new(FramedConsole::stdio());
    init_tracing(console.clone());

    let catalog = ProviderCatalog::new().with_command_providers(console.clone());
    webstir_host::cli::module_host::run(catalog, &console).await;
}
