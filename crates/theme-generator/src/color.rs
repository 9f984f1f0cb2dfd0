//! Color literal validation.
//!
//! Copyright (c) 2025 Posit, PBC

use once_cell::sync::Lazy;
use regex::Regex;

/// Palette and color-manipulation helpers whose result is always a color.
static COLOR_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"colorPalette|fade|shade|tint").unwrap());

static FUNCTIONAL_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(rgb|hsl)a?\((\d+%?(deg|rad|grad|turn)?[,\s]+){2,3}[\s/]*[\d.]+%?\)$")
        .unwrap()
});

/// Check whether `value` is a color a theme variable can hold.
///
/// Accepts hex colors (`#fff`, `#ffff`, `#ffffff`, `#ffffffff`), `rgb[a]()` /
/// `hsl[a]()` functional notation, and palette helper calls. Lengths are
/// always rejected.
///
/// ```
/// use theme_generator::is_valid_color;
///
/// assert!(is_valid_color("#ffffff"));
/// assert!(is_valid_color("#fff"));
/// assert!(is_valid_color("rgba(0, 0, 0, 0.5)"));
/// assert!(!is_valid_color("20px"));
/// ```
pub fn is_valid_color(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.contains("px") {
        return false;
    }
    if COLOR_FUNCTION.is_match(value) {
        return true;
    }
    if let Some(hex) = value.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    FUNCTIONAL_COLOR.is_match(value)
}
