//! Route `tracing` output through a [`Console`].
//!
//! [`ConsoleMakeWriter`] picks the console level from each event's metadata, so a `warn!` from host or
//! provider code lands on stderr with a `warn` frame and an `info!` lands on stdout with an `info` frame.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{Level, Metadata};
use webstir_protocol::ConsoleLevel;

use super::Console;

/// [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) backed by a [`Console`].
#[derive(Clone)]
pub struct ConsoleMakeWriter {
    console: Arc<dyn Console>,
}

impl ConsoleMakeWriter {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }
}

pub fn console_level(level: &Level) -> ConsoleLevel {
    match *level {
        Level::ERROR => ConsoleLevel::Error,
        Level::WARN => ConsoleLevel::Warn,
        Level::INFO => ConsoleLevel::Info,
        _ => ConsoleLevel::Log,
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleLineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLineWriter {
            console: Arc::clone(&self.console),
            level: ConsoleLevel::Log,
            buf: Vec::with_capacity(256),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleLineWriter {
            console: Arc::clone(&self.console),
            level: console_level(meta.level()),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Per-event writer. Buffers the formatted event and hands it to the console on [`Drop`].
pub struct ConsoleLineWriter {
    console: Arc<dyn Console>,
    level: ConsoleLevel,
    buf: Vec<u8>,
}

impl Write for ConsoleLineWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleLineWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let message = text.trim_end_matches(['\n', '\r']);
        if message.is_empty() {
            return;
        }
        self.console.emit(self.level, message);
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), formatted without timestamps,
/// levels or ANSI so the console frames carry just the message.
pub fn init_tracing(console: Arc<dyn Console>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(ConsoleMakeWriter::new(console))
        .with_ansi(false)
        .with_level(false)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{FramedConsole, Output};
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_level_mapping() {
        assert_eq!(console_level(&Level::ERROR), ConsoleLevel::Error);
        assert_eq!(console_level(&Level::WARN), ConsoleLevel::Warn);
        assert_eq!(console_level(&Level::INFO), ConsoleLevel::Info);
        assert_eq!(console_level(&Level::DEBUG), ConsoleLevel::Log);
        assert_eq!(console_level(&Level::TRACE), ConsoleLevel::Log);
    }

    #[test]
    fn test_writer_emits_one_message_on_drop() {
        let (stdout, out) = Output::capture();
        let (stderr, err) = Output::capture();
        let make = ConsoleMakeWriter::new(Arc::new(FramedConsole::new(stdout, stderr)));

        {
            let mut writer = make.make_writer();
            writer.write_all(b"provider ").unwrap();
            writer.write_all(b"ready\n").unwrap();
        }

        assert_eq!(out.lines(), vec!["provider ready"]);
        assert_eq!(
            err.lines(),
            vec![r#"WEBSTIR_MODULE_EVENT {"type":"log","message":"provider ready"}"#]
        );
    }

    #[test]
    fn test_subscriber_routes_warn_to_stderr() {
        let (stdout, out) = Output::capture();
        let (stderr, err) = Output::capture();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(ConsoleMakeWriter::new(Arc::new(FramedConsole::new(stdout, stderr))))
            .with_ansi(false)
            .with_level(false)
            .with_target(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("cache is cold");
        });

        assert!(out.contents().is_empty());
        assert_eq!(
            err.lines(),
            vec![
                r#"WEBSTIR_MODULE_EVENT {"type":"warn","message":"cache is cold"}"#,
                "cache is cold",
            ]
        );
    }
}
