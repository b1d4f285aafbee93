//! Protocol event framing on stdout.

use serde::Serialize;
use webstir_protocol::frame::encode_line;
use webstir_protocol::{Event, MODULE_RESULT_PREFIX, ModuleResult, TEST_EVENT_PREFIX};

use crate::console::Output;
use crate::error::HostError;

/// Writes prefixed JSON lines to a host's stdout.
#[derive(Debug, Clone)]
pub struct EventWriter {
    prefix: &'static str,
    out: Output,
}

impl EventWriter {
    /// `WEBSTIR_TEST` events.
    pub fn test_events(out: Output) -> Self {
        Self {
            prefix: TEST_EVENT_PREFIX,
            out,
        }
    }

    /// The single `WEBSTIR_MODULE_RESULT` payload.
    pub fn module_results(out: Output) -> Self {
        Self {
            prefix: MODULE_RESULT_PREFIX,
            out,
        }
    }

    pub fn emit_payload<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), HostError> {
        let line = encode_line(self.prefix, payload)?;
        self.out.write_line(&line)?;
        Ok(())
    }

    pub fn emit(&self, event: &Event) -> Result<(), HostError> {
        self.emit_payload(event)
    }

    pub fn emit_module_result(&self, result: &ModuleResult) -> Result<(), HostError> {
        self.emit_payload(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webstir_protocol::RunId;

    #[test]
    fn test_event_is_one_prefixed_line() {
        let (out, captured) = Output::capture();
        let writer = EventWriter::test_events(out);
        writer.emit(&Event::info(&RunId::new("r1"), "two\nlines")).unwrap();

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("WEBSTIR_TEST {"));
    }

    #[test]
    fn test_module_result_prefix() {
        let (out, captured) = Output::capture();
        let writer = EventWriter::module_results(out);
        writer
            .emit_module_result(&ModuleResult {
                provider: json!({"name": "p"}),
                manifest: json!({"entry": "index.js"}),
                artifacts: vec![],
            })
            .unwrap();

        insta::assert_snapshot!(
            captured.contents().trim_end(),
            @r#"WEBSTIR_MODULE_RESULT {"provider":{"name":"p"},"manifest":{"entry":"index.js"},"artifacts":[]}"#
        );
    }
}
