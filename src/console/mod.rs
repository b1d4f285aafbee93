//! Console interception.
//!
//! Every console line a host (or the provider code it runs) produces is written twice:
//!
//! 1. verbatim to the real stream (`log`/`info` to stdout, `warn`/`error` to stderr), so developer-facing
//!    output is unchanged, and
//! 2. as a `WEBSTIR_MODULE_EVENT {"type", "message"}` frame on stderr for the supervising parent.
//!
//! Components receive a [`Console`] instead of touching process-wide state. [`FramedConsole`] is the one
//! concrete implementation; [`tracing_writer::ConsoleMakeWriter`] plugs it under `tracing` so log macros
//! take the same path.

pub mod tracing_writer;

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use webstir_protocol::frame::encode_line;
use webstir_protocol::{ConsoleEvent, ConsoleLevel, MODULE_EVENT_PREFIX};

pub use tracing_writer::ConsoleMakeWriter;

// ============================================================================
// Output streams
// ============================================================================

/// A shareable line-oriented output stream.
///
/// Each [`Output::write_line`] holds the lock for the whole line, so frames never interleave mid-line.
#[derive(Clone)]
pub struct Output {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Output {
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    /// An in-memory stream plus a handle for reading back what was written.
    pub fn capture() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::from_writer(captured.clone()), captured)
    }

    /// Write `line` followed by `\n` and flush.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut sink = self.sink.lock();
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        sink.flush()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output").finish_non_exhaustive()
    }
}

/// Shared in-memory buffer behind [`Output::capture`].
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Console
// ============================================================================

/// Explicit logger handed to hosts and providers.
pub trait Console: Send + Sync {
    /// Write one message at `level`. Must never fail or panic.
    fn emit(&self, level: ConsoleLevel, message: &str);

    fn log(&self, message: &str) {
        self.emit(ConsoleLevel::Log, message);
    }

    fn info(&self, message: &str) {
        self.emit(ConsoleLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(ConsoleLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(ConsoleLevel::Error, message);
    }
}

/// Forwards to the real streams and emits the wrapped frame on stderr.
#[derive(Debug, Clone)]
pub struct FramedConsole {
    stdout: Output,
    stderr: Output,
}

impl FramedConsole {
    pub fn new(stdout: Output, stderr: Output) -> Self {
        Self { stdout, stderr }
    }

    /// Console bound to the process's own stdout/stderr.
    pub fn stdio() -> Self {
        Self::new(Output::stdout(), Output::stderr())
    }

    pub fn stdout(&self) -> &Output {
        &self.stdout
    }

    pub fn stderr(&self) -> &Output {
        &self.stderr
    }
}

impl Console for FramedConsole {
    fn emit(&self, level: ConsoleLevel, message: &str) {
        // A console that cannot write has nowhere to report the failure.
        if let Ok(frame) = encode_line(MODULE_EVENT_PREFIX, &ConsoleEvent::new(level, message)) {
            let _ = self.stderr.write_line(&frame);
        }
        let target = if level.is_stderr() { &self.stderr } else { &self.stdout };
        let _ = target.write_line(message);
    }
}

/// Render any value as console text.
///
/// Strings pass through unquoted; other values become JSON. If serialization fails (non-string map
/// keys, a `Serialize` impl that errors, ...) the `Debug` rendering is used instead.
pub fn stringify<T: Serialize + fmt::Debug + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => text,
        Ok(json) => json.to_string(),
        Err(_) => format!("{value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn console() -> (FramedConsole, CapturedOutput, CapturedOutput) {
        let (stdout, out) = Output::capture();
        let (stderr, err) = Output::capture();
        (FramedConsole::new(stdout, stderr), out, err)
    }

    #[test]
    fn test_log_goes_to_stdout_and_frame_to_stderr() {
        let (console, out, err) = console();
        console.log("compiled 3 files");
        assert_eq!(out.lines(), vec!["compiled 3 files"]);
        assert_eq!(
            err.lines(),
            vec![r#"WEBSTIR_MODULE_EVENT {"type":"log","message":"compiled 3 files"}"#]
        );
    }

    #[test]
    fn test_warn_and_error_go_to_stderr() {
        let (console, out, err) = console();
        console.warn("slow");
        console.error("bad");
        assert!(out.contents().is_empty());
        assert_eq!(
            err.lines(),
            vec![
                r#"WEBSTIR_MODULE_EVENT {"type":"warn","message":"slow"}"#,
                "slow",
                r#"WEBSTIR_MODULE_EVENT {"type":"error","message":"bad"}"#,
                "bad",
            ]
        );
    }

    #[test]
    fn test_info_is_stdout() {
        let (console, out, _err) = console();
        console.info("ready");
        assert_eq!(out.lines(), vec!["ready"]);
    }

    #[test]
    fn test_stringify_text_and_json() {
        assert_eq!(stringify("plain"), "plain");
        assert_eq!(stringify(&42), "42");
        assert_eq!(stringify(&vec!["a", "b"]), r#"["a","b"]"#);
    }

    #[test]
    fn test_stringify_falls_back_to_debug() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON");
        let rendered = stringify(&map);
        assert!(rendered.contains("tuple keys are not JSON"));
    }

    #[derive(Debug)]
    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cyclic"))
        }
    }

    #[test]
    fn test_unserializable_value_still_produces_wrapped_event() {
        let (console, out, err) = console();
        console.log(&stringify(&Refuses));
        assert_eq!(out.lines(), vec!["Refuses"]);
        assert_eq!(err.lines(), vec![r#"WEBSTIR_MODULE_EVENT {"type":"log","message":"Refuses"}"#]);
    }
}
