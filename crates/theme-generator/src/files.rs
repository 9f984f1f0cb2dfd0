//! Corpus file discovery.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::dialect::Dialect;
use crate::error::{Result, ThemeError};

/// Find the style files under `styles_dir` that make up the corpus.
///
/// Files are returned in a stable order (directory walk sorted by file name).
/// Only files with the dialect's extension are considered. When `include` is
/// non-empty, a file must also match at least one of its glob patterns;
/// relative patterns are taken relative to `styles_dir`. `*` stops at path
/// separators, so `**` is the only pattern that descends into directories.
///
/// # Errors
///
/// - [`ThemeError::InvalidPattern`] for a malformed glob
/// - [`ThemeError::Read`] if `styles_dir` can't be walked
pub fn discover_style_files(
    styles_dir: &Path,
    include: &[String],
    dialect: Dialect,
) -> Result<Vec<PathBuf>> {
    let patterns = include
        .iter()
        .map(|pattern| compile_pattern(styles_dir, pattern))
        .collect::<Result<Vec<_>>>()?;

    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(styles_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(styles_dir).to_path_buf();
            ThemeError::read(path, e.into())
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(dialect.extension()) {
            continue;
        }
        if !patterns.is_empty() && !patterns.iter().any(|p| p.matches_path_with(path, options)) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    Ok(files)
}

fn compile_pattern(styles_dir: &Path, pattern: &str) -> Result<Pattern> {
    let absolute = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let dir = styles_dir.to_string_lossy();
        let dir = dir.trim_end_matches('/');
        let pattern = pattern.trim_start_matches("./");
        format!("{}/{}", Pattern::escape(dir), pattern)
    };

    Pattern::new(&absolute).map_err(|e| ThemeError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("components/button")).unwrap();
        fs::write(dir.path().join("vars.less"), "@a: 1px;").unwrap();
        fs::write(dir.path().join("components/button/index.less"), ".btn {}").unwrap();
        fs::write(dir.path().join("components/card.less"), ".card {}").unwrap();
        fs::write(dir.path().join("components/readme.md"), "# docs").unwrap();
        fs::write(dir.path().join("theme.scss"), ".x {}").unwrap();
        dir
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_all_files_of_dialect_recursively() {
        let dir = fixture();
        let files = discover_style_files(dir.path(), &[], Dialect::Less).unwrap();
        assert_eq!(
            names(dir.path(), &files),
            vec!["components/button/index.less", "components/card.less", "vars.less"]
        );
    }

    #[test]
    fn test_scss_dialect() {
        let dir = fixture();
        let files = discover_style_files(dir.path(), &[], Dialect::Scss).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["theme.scss"]);
    }

    #[test]
    fn test_relative_include_patterns() {
        let dir = fixture();
        let include = vec!["components/**/*.less".to_string()];
        let files = discover_style_files(dir.path(), &include, Dialect::Less).unwrap();
        assert_eq!(
            names(dir.path(), &files),
            vec!["components/button/index.less", "components/card.less"]
        );
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let dir = fixture();
        let include = vec!["*.less".to_string()];
        let files = discover_style_files(dir.path(), &include, Dialect::Less).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["vars.less"]);

        let include = vec!["components/*.less".to_string()];
        let files = discover_style_files(dir.path(), &include, Dialect::Less).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["components/card.less"]);
    }

    #[test]
    fn test_absolute_include_pattern() {
        let dir = fixture();
        let include = vec![dir.path().join("*.less").to_string_lossy().to_string()];
        let files = discover_style_files(dir.path(), &include, Dialect::Less).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["vars.less"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = fixture();
        let include = vec!["[".to_string()];
        let result = discover_style_files(dir.path(), &include, Dialect::Less);
        assert!(matches!(result, Err(ThemeError::InvalidPattern { .. })));
    }

    #[test]
    fn test_missing_styles_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_style_files(&dir.path().join("missing"), &[], Dialect::Less);
        assert!(matches!(result, Err(ThemeError::Read { .. })));
    }
}
