//! Structured messages emitted to the parent process.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::{Runtime, TestManifest};
use crate::summary::{RunSummary, TestOutcome};

/// Token identifying one invocation of the test host.
///
/// Only needs to disambiguate concurrent runs for a human reader; it is not globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
}

/// Which summary a `summary` event carries: one runtime group, or the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryScope {
    Frontend,
    Backend,
    All,
}

impl From<Runtime> for SummaryScope {
    fn from(runtime: Runtime) -> Self {
        match runtime {
            Runtime::Frontend => SummaryScope::Frontend,
            Runtime::Backend => SummaryScope::Backend,
        }
    }
}

/// One test host protocol event. Serialized as `{"type": <kind>, "runId": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Event {
    Start {
        run_id: RunId,
        manifest: TestManifest,
    },
    Log {
        run_id: RunId,
        level: LogLevel,
        message: String,
    },
    Result {
        run_id: RunId,
        runtime: Runtime,
        module_id: String,
        result: TestOutcome,
    },
    Summary {
        run_id: RunId,
        runtime: SummaryScope,
        summary: RunSummary,
    },
    Error {
        run_id: RunId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl Event {
    pub fn run_id(&self) -> &RunId {
        match self {
            Event::Start { run_id, .. }
            | Event::Log { run_id, .. }
            | Event::Result { run_id, .. }
            | Event::Summary { run_id, .. }
            | Event::Error { run_id, .. } => run_id,
        }
    }

    pub fn info(run_id: &RunId, message: impl Into<String>) -> Self {
        Event::Log {
            run_id: run_id.clone(),
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(run_id: &RunId, message: impl Into<String>) -> Self {
        Event::Log {
            run_id: run_id.clone(),
            level: LogLevel::Warn,
            message: message.into(),
        }
    }

    pub fn summary(run_id: &RunId, scope: impl Into<SummaryScope>, summary: RunSummary) -> Self {
        Event::Summary {
            run_id: run_id.clone(),
            runtime: scope.into(),
            summary,
        }
    }
}

/// The module host's single result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    /// The provider's metadata, verbatim.
    pub provider: Value,
    pub manifest: Value,
    #[serde(default)]
    pub artifacts: Vec<Value>,
}
