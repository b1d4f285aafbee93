//! Discovered test modules and the manifest that orders them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two execution contexts sharing a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Frontend,
    Backend,
}

impl Runtime {
    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Frontend => "frontend",
            Runtime::Backend => "backend",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(Runtime::Frontend),
            "backend" => Ok(Runtime::Backend),
            other => Err(format!("unknown runtime '{other}'")),
        }
    }
}

/// One discovered test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestModule {
    /// Slash-joined path relative to the source root; stable and sortable.
    pub id: String,
    pub runtime: Runtime,
    pub source_path: PathBuf,
    /// Build output location. Discovery always derives one; providers of hand-built manifests may not.
    pub compiled_path: Option<PathBuf>,
}

/// The sorted result of one discovery pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestManifest {
    pub workspace_root: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub modules: Vec<TestModule>,
}

impl TestManifest {
    /// Build a manifest stamped with the current time. Modules are sorted by `id`.
    pub fn new(workspace_root: impl Into<PathBuf>, mut modules: Vec<TestModule>) -> Self {
        modules.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            workspace_root: workspace_root.into(),
            generated_at: Utc::now(),
            modules,
        }
    }

    pub fn empty(workspace_root: impl Into<PathBuf>) -> Self {
        Self::new(workspace_root, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Keep only the modules of `runtime`, preserving order and the original timestamp.
    pub fn retain_runtime(&self, runtime: Runtime) -> Self {
        Self {
            workspace_root: self.workspace_root.clone(),
            generated_at: self.generated_at,
            modules: self.modules.iter().filter(|m| m.runtime == runtime).cloned().collect(),
        }
    }
}
