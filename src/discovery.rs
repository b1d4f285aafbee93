//! Test discovery
//!
//! Walks `<workspace>/src` depth-first and collects every `*.test.ts` / `*.test.js` file that sits
//! somewhere below a `tests` folder. The suffix alone is not enough: `src/frontend/app.test.ts` is
//! ignored, `src/frontend/pages/home/tests/app.test.ts` is collected.
//!
//! Unreadable directories are treated as empty. A workspace without `src` yields an empty manifest.

use std::fs;
use std::path::{Component, Path, PathBuf};

use webstir_protocol::{Runtime, TestManifest, TestModule};

pub const SRC_FOLDER: &str = "src";
pub const BUILD_FOLDER: &str = "build";
pub const TEST_FOLDER: &str = "tests";
pub const BACKEND_FOLDER: &str = "backend";
pub const TEST_SUFFIXES: [&str; 2] = [".test.ts", ".test.js"];
pub const EXCLUDED_DIRECTORIES: [&str; 4] = ["node_modules", "build", "dist", ".git"];
/// Extension of compiled test output under `build/`.
pub const COMPILED_EXTENSION: &str = "js";

/// Discover the test manifest for `workspace_root`.
pub fn discover_test_manifest(workspace_root: &Path) -> TestManifest {
    let src_root = workspace_root.join(SRC_FOLDER);
    if !src_root.is_dir() {
        tracing::debug!("no {} folder under {}", SRC_FOLDER, workspace_root.display());
        return TestManifest::empty(workspace_root);
    }

    let mut modules = Vec::new();
    walk_directory(&src_root, &mut |file_path: &Path| {
        let Ok(relative) = file_path.strip_prefix(&src_root) else {
            return;
        };
        if !is_under_tests_folder(relative) || !is_test_file(file_path) {
            return;
        }

        modules.push(TestModule {
            id: module_id(relative),
            runtime: infer_runtime(relative),
            source_path: file_path.to_path_buf(),
            compiled_path: Some(compiled_path(workspace_root, relative)),
        });
    });

    tracing::debug!("discovered {} test module(s)", modules.len());
    TestManifest::new(workspace_root, modules)
}

fn walk_directory(dir: &Path, on_file: &mut dyn FnMut(&Path)) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let entry_path = entry.path();

        if file_type.is_dir() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if is_excluded_directory(&name) {
                continue;
            }
            walk_directory(&entry_path, on_file);
        } else if file_type.is_file() {
            on_file(&entry_path);
        }
    }
}

pub fn is_excluded_directory(name: &str) -> bool {
    name.starts_with('.') || EXCLUDED_DIRECTORIES.contains(&name)
}

pub fn is_test_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    TEST_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn segments(relative: &Path) -> impl Iterator<Item = std::borrow::Cow<'_, str>> {
    relative.components().filter_map(|component| match component {
        Component::Normal(segment) => Some(segment.to_string_lossy()),
        _ => None,
    })
}

pub fn is_under_tests_folder(relative: &Path) -> bool {
    segments(relative).any(|segment| segment == TEST_FOLDER)
}

/// `backend` when the first segment below `src` is the backend folder, otherwise `frontend`.
pub fn infer_runtime(relative: &Path) -> Runtime {
    match segments(relative).next() {
        Some(first) if first == BACKEND_FOLDER => Runtime::Backend,
        _ => Runtime::Frontend,
    }
}

pub fn module_id(relative: &Path) -> String {
    segments(relative).collect::<Vec<_>>().join("/")
}

/// `<workspace>/build/<relative with its last extension replaced by .js>`
pub fn compiled_path(workspace_root: &Path, relative: &Path) -> PathBuf {
    workspace_root
        .join(BUILD_FOLDER)
        .join(relative.with_extension(COMPILED_EXTENSION))
}
