//! Line codec for the stdio protocol.
//!
//! A framed line is `<PREFIX><json>` with no trailing newline inside the payload. JSON encoding never
//! emits raw newlines, so one payload is always exactly one line.

use serde::Serialize;
use thiserror::Error;

use crate::console::ConsoleEvent;
use crate::event::{Event, ModuleResult};
use crate::{MODULE_EVENT_PREFIX, MODULE_RESULT_PREFIX, TEST_EVENT_PREFIX};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed {prefix:?} frame: {source}")]
    Decode {
        prefix: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode `payload` as one prefixed line (without the trailing newline).
pub fn encode_line<T: Serialize + ?Sized>(prefix: &str, payload: &T) -> Result<String, FrameError> {
    let json = serde_json::to_string(payload).map_err(FrameError::Encode)?;
    Ok(format!("{prefix}{json}"))
}

/// One classified line read from a host's stdout or stderr.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<'a> {
    Test(Event),
    ModuleResult(ModuleResult),
    Console(ConsoleEvent),
    /// Ordinary output; never interpreted.
    Passthrough(&'a str),
}

/// Classify one line. A trailing `\n` or `\r\n` is ignored.
///
/// Only an exact prefix match makes a line structured; a prefixed line whose JSON does not decode is
/// an error rather than passthrough.
pub fn parse_line(line: &str) -> Result<Frame<'_>, FrameError> {
    let line = line.trim_end_matches(['\n', '\r']);

    if let Some(json) = line.strip_prefix(TEST_EVENT_PREFIX) {
        return serde_json::from_str(json)
            .map(Frame::Test)
            .map_err(|source| FrameError::Decode {
                prefix: TEST_EVENT_PREFIX,
                source,
            });
    }
    if let Some(json) = line.strip_prefix(MODULE_RESULT_PREFIX) {
        return serde_json::from_str(json)
            .map(Frame::ModuleResult)
            .map_err(|source| FrameError::Decode {
                prefix: MODULE_RESULT_PREFIX,
                source,
            });
    }
    if let Some(json) = line.strip_prefix(MODULE_EVENT_PREFIX) {
        return serde_json::from_str(json)
            .map(Frame::Console)
            .map_err(|source| FrameError::Decode {
                prefix: MODULE_EVENT_PREFIX,
                source,
            });
    }

    Ok(Frame::Passthrough(line))
}
