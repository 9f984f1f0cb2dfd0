//! Marker color extraction from compiled probe output.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The probe stylesheet contains one marker rule per theme variable:
//!
//! ```text
//! .primary-color { color: @primary-color; }
//! ```
//!
//! After compilation the compiler has resolved the reference, so scanning the
//! output for `.<marker> {\n  color: <value>;` tells us which literal each
//! theme variable stands for.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*[\s\S]*?\*/").unwrap());

/// A single-declaration marker rule in compiled output.
static MARKER_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([\w'-]+)[ \t]*\{\s*color:[ \t]*([^;\n]+);").unwrap());

/// Marker class name (variable name without sigil) → resolved literal color.
///
/// Entries keep the order in which markers appear in the compiled output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorCorrespondence {
    entries: IndexMap<String, String>,
}

impl ColorCorrespondence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a marker color. The first recorded color for a marker wins;
    /// empty markers or colors are ignored.
    pub fn record(&mut self, marker: &str, color: &str) -> bool {
        let marker = marker.trim();
        let color = color.trim();
        if marker.is_empty() || color.is_empty() || self.entries.contains_key(marker) {
            return false;
        }
        self.entries.insert(marker.to_string(), color.to_string());
        true
    }

    pub fn get(&self, marker: &str) -> Option<&str> {
        self.entries.get(marker).map(String::as_str)
    }

    /// Marker/color pairs in output order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The resolved colors, in output order, without duplicates.
    pub fn colors(&self) -> Vec<String> {
        let mut colors: Vec<String> = Vec::with_capacity(self.entries.len());
        for color in self.entries.values() {
            if !colors.contains(color) {
                colors.push(color.clone());
            }
        }
        colors
    }

    /// Keep only the markers for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|marker, _| keep(marker));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a compiled probe value has the shape of a resolved color.
///
/// The probe guarantees the value is whatever the compiler emits for a color,
/// so a prefix check is enough here.
fn looks_like_color(value: &str) -> bool {
    value.starts_with('#') || value.starts_with("rgba")
}

/// Scan compiled CSS for marker rules and record their colors.
///
/// Values that are neither hex nor `rgba(...)` are skipped. When a marker is
/// emitted more than once, the first occurrence wins.
pub fn extract_marker_colors(compiled_css: &str) -> ColorCorrespondence {
    let css = BLOCK_COMMENT.replace_all(compiled_css, "");
    let mut correspondence = ColorCorrespondence::new();

    for captures in MARKER_RULE.captures_iter(&css) {
        let value = captures[2].trim();
        if looks_like_color(value) {
            correspondence.record(&captures[1], value);
        }
    }
    correspondence
}
