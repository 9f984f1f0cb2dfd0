//! Source language conventions.
//!
//! Copyright (c) 2025 Posit, PBC

use serde::{Deserialize, Serialize};

/// The variable-superset style language a project is written in.
///
/// The pipeline is identical for both dialects; only the variable sigil, the
/// file extension of corpus files and the availability of inline palette
/// functions differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Less: `@name: value;`, `.less` files, inline JavaScript functions
    #[default]
    Less,
    /// SCSS: `$name: value;`, `.scss` files
    Scss,
}

impl Dialect {
    /// The character that starts a variable name.
    pub fn sigil(&self) -> char {
        match self {
            Dialect::Less => '@',
            Dialect::Scss => '$',
        }
    }

    /// File extension of corpus style files (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Dialect::Less => "less",
            Dialect::Scss => "scss",
        }
    }

    /// Theme variable used when none can be resolved.
    pub fn default_theme_variable(&self) -> String {
        self.variable("theme-color")
    }

    /// Build a variable reference from a bare name (`primary-color` → `@primary-color`).
    pub fn variable(&self, bare: &str) -> String {
        format!("{}{}", self.sigil(), bare)
    }

    /// Strip the sigil from a variable name, if present.
    pub fn bare_name<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.sigil()).unwrap_or(name)
    }

    /// Whether the language can evaluate inline palette functions at runtime.
    pub fn supports_inline_functions(&self) -> bool {
        matches!(self, Dialect::Less)
    }

    /// Parse a dialect name (`less` or `scss`, case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "less" => Some(Dialect::Less),
            "scss" | "sass" => Some(Dialect::Scss),
            _ => None,
        }
    }
}
