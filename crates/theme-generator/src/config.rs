//! Theme generation configuration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Configuration is usually built in code or loaded from a JSON/YAML file:
//!
//! ```yaml
//! stylesDir: ./node_modules/antd/lib
//! varFile: ./node_modules/antd/lib/style/themes/default.less
//! outputFilePath: ./public/color.less
//! themeVariables: ["@primary-color"]
//! themeReplacement:
//!   "@primary-color": "#ff0000"
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::compiler::CompilerOptions;
use crate::dialect::Dialect;
use crate::error::{Result, ThemeError};

/// Pattern selecting theme-relevant names in the color file.
pub const DEFAULT_COLOR_FILE_THEME_REGEX: &str = r"^[@$]primary-\d+$";

/// Options for one theme generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    /// Root directory searched for corpus style files
    pub styles_dir: PathBuf,

    /// Primary variable-declaration source
    pub var_file: PathBuf,

    /// Secondary source whose variables are merged over the variable file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_less_file: Option<PathBuf>,

    /// Where to write the generated theme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_path: Option<PathBuf>,

    /// Explicit theme variables; inferred from the variable map when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_variables: Option<Vec<String>>,

    /// Names removed from the inferred theme variable list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_variables: Vec<String>,

    /// Glob patterns restricting which corpus files are reduced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Options passed to every compile call
    #[serde(default)]
    pub options: CompilerOptions,

    /// Additional variable source, usually a generated color palette
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_file_theme_regex: Option<String>,

    /// Override values for the final variable declarations
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub theme_replacement: IndexMap<String, String>,

    #[serde(default)]
    pub dialect: Dialect,

    /// Emit palette-function expressions for numbered shade variables
    #[serde(default)]
    pub shade_palette: bool,
}

impl ThemeConfig {
    pub fn new(styles_dir: impl Into<PathBuf>, var_file: impl Into<PathBuf>) -> Self {
        Self {
            styles_dir: styles_dir.into(),
            var_file: var_file.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a `.json`, `.yaml` or `.yml` file.
    ///
    /// Relative paths inside the file are kept as written; they resolve
    /// against the working directory, like paths given on the command line.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ThemeError::read(path, e))?;
        Self::parse(path, &content)
    }

    /// Async variant of [`ThemeConfig::from_file`] for use on a runtime thread.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ThemeError::read(path, e))?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parsed = match extension.as_deref() {
            Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
            Some("yaml" | "yml") => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            _ => Err(format!(
                "unsupported configuration format '{}' (expected .json, .yaml or .yml)",
                path.display()
            )),
        };

        parsed.map_err(|message| ThemeError::InvalidConfig {
            message: format!("{}: {}", path.display(), message),
        })
    }

    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file_path = Some(path.into());
        self
    }

    pub fn with_main_less_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.main_less_file = Some(path.into());
        self
    }

    pub fn with_theme_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.theme_variables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_variables = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_color_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.color_file = Some(path.into());
        self
    }

    pub fn with_color_file_theme_regex(mut self, pattern: impl Into<String>) -> Self {
        self.color_file_theme_regex = Some(pattern.into());
        self
    }

    pub fn with_replacement(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.theme_replacement.insert(name.into(), value.into());
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_shade_palette(mut self, enabled: bool) -> Self {
        self.shade_palette = enabled;
        self
    }

    /// The compiled color-file selection pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::InvalidPattern`] if the configured expression is malformed.
    pub fn color_file_theme_regex(&self) -> Result<Regex> {
        let pattern = self
            .color_file_theme_regex
            .as_deref()
            .unwrap_or(DEFAULT_COLOR_FILE_THEME_REGEX);
        Regex::new(pattern).map_err(|e| ThemeError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
    }
}
