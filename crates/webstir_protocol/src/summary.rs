//! Pass/fail summaries and the per-test outcomes providers report.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One provider-reported test outcome.
///
/// Only `file` is interpreted by the hosts; everything else the provider sent is carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// The compiled file this outcome belongs to, as the provider reported it.
    pub file: PathBuf,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl TestOutcome {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            details: Map::new(),
        }
    }

    /// Attach a provider-specific field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Aggregate or per-runtime result.
///
/// `total` is provider-reported and authoritative; it need not equal `passed + failed`.
///
/// ## Notes
///
/// - [`RunSummary::merge`] is field-wise addition plus concatenation of `results`; it is associative and
///   [`RunSummary::default`] is its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSummary {
    pub passed: u64,
    pub failed: u64,
    pub total: u64,
    #[serde(deserialize_with = "deserialize_millis")]
    pub duration_ms: u64,
    pub results: Vec<TestOutcome>,
}

impl RunSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold `other` into `self`. The left operand's results precede the right operand's.
    pub fn merge(mut self, other: RunSummary) -> Self {
        self.passed += other.passed;
        self.failed += other.failed;
        self.total += other.total;
        self.duration_ms += other.duration_ms;
        self.results.extend(other.results);
        self
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl FromIterator<RunSummary> for RunSummary {
    fn from_iter<I: IntoIterator<Item = RunSummary>>(iter: I) -> Self {
        iter.into_iter().fold(RunSummary::empty(), RunSummary::merge)
    }
}

/// Providers may report fractional or negative durations; store whole, non-negative milliseconds.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_finite() && raw > 0.0 {
        Ok(raw.round() as u64)
    } else {
        Ok(0)
    }
}
