//! Import flattening for variable sources.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The variable file is compiled several times and its text is also emitted
//! verbatim at the top of the generated theme, so it has to be
//! self-contained. Local `@import` statements are replaced by the content of
//! the imported file, recursively:
//!
//! ```text
//! // vars.less                      // bundled
//! @import "./colors";               @blue: #1890ff;
//! @primary-color: @blue;            @primary-color: @blue;
//! ```
//!
//! Package imports (`~pkg/...`), remote and `.css` imports are left in place
//! for the compiler, as are imports that can't be resolved.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::{Result, ThemeError};

/// A whole-line `@import` with optional Less import options.
/// Group 1: options, group 2: path.
static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*@import\s*(?:\(([^)]*)\)\s*)?["']([^"']+)["']\s*;?\s*$"#).unwrap()
});

/// Read `path` and inline its local imports recursively.
///
/// # Errors
///
/// Returns [`ThemeError::Read`] if `path` or a resolved import can't be read.
pub fn bundle_file(path: &Path, dialect: Dialect) -> Result<String> {
    let mut chain = Vec::new();
    bundle_recursive(path, dialect, &mut chain)
}

fn bundle_recursive(path: &Path, dialect: Dialect, chain: &mut Vec<PathBuf>) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| ThemeError::read(path, e))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    chain.push(canonical(path));

    let mut lines = Vec::new();
    for line in content.lines() {
        let Some(target) = local_import(line) else {
            lines.push(line.to_string());
            continue;
        };

        match resolve_import(base_dir, target, dialect) {
            Some(resolved) => {
                if chain.contains(&canonical(&resolved)) {
                    debug!(import = target, file = %path.display(), "Skipping circular import");
                    continue;
                }
                lines.push(bundle_recursive(&resolved, dialect, chain)?);
            }
            None => {
                warn!(import = target, file = %path.display(), "Unresolved import left for the compiler");
                lines.push(line.to_string());
            }
        }
    }

    chain.pop();
    Ok(lines.join("\n"))
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// The import path of a line that imports a local stylesheet, if it does.
fn local_import(line: &str) -> Option<&str> {
    let captures = IMPORT_LINE.captures(line)?;
    let options = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let target = captures.get(2)?.as_str();

    let is_css = options.split(',').any(|o| o.trim() == "css") || target.ends_with(".css");
    let is_remote = target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//");
    let is_package = target.starts_with('~');

    if is_css || is_remote || is_package {
        None
    } else {
        Some(target)
    }
}

/// Resolve an import path relative to `base_dir`, trying the path as written,
/// with the dialect extension, and as an SCSS partial.
fn resolve_import(base_dir: &Path, target: &str, dialect: Dialect) -> Option<PathBuf> {
    let direct = base_dir.join(target);
    let mut candidates = vec![direct.clone()];

    if direct.extension().is_none() {
        candidates.push(direct.with_extension(dialect.extension()));
    }
    if dialect == Dialect::Scss {
        if let Some(name) = direct.file_name().and_then(|n| n.to_str()) {
            let partial = direct.with_file_name(format!("_{}", name));
            if partial.extension().is_none() {
                candidates.push(partial.with_extension(dialect.extension()));
            } else {
                candidates.push(partial);
            }
        }
    }

    candidates.into_iter().find(|c| c.is_file())
}
