//! Reduction of a compiled stylesheet to theme-colored declarations.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Input:
//!
//! ```text
//! .body {
//!   font-family: 'Lato';
//!   background: #1890ff;
//!   color: #000;
//!   padding: 0;
//! }
//! ```
//!
//! Output, with `#1890ff` as the only theme color:
//!
//! ```text
//! .body {
//!   background: #1890ff;
//! }
//! ```
//!
//! The classification is substring-based. Dropping a declaration only loses an
//! unthemed style; every surviving value textually contains a theme color.

use crate::stylesheet::{Declaration, Node, Stylesheet, parse_stylesheet};

/// Selector prefix of compiler helper rules emitted by palette probes.
pub const PALETTE_PROBE_PREFIX: &str = ".main-color .palatte-";

/// Property-name fragments of paint-affecting properties.
const COLOR_PROPERTIES: &[&str] = &[
    "color",
    "background",
    "border",
    "box-shadow",
    "outline",
    "stroke",
];

/// Value fragments that indicate a literal color.
const COLOR_VALUE_MARKERS: &[&str] = &["#", "rgb", "hsl"];

/// Whether a declaration sets a paint-affecting property to a literal color.
pub fn is_color_declaration(decl: &Declaration) -> bool {
    COLOR_PROPERTIES.iter().any(|p| decl.property.contains(p))
        && COLOR_VALUE_MARKERS.iter().any(|m| decl.value.contains(m))
}

fn is_theme_declaration(decl: &Declaration, theme_colors: &[String]) -> bool {
    is_color_declaration(decl) && theme_colors.iter().any(|c| decl.value.contains(c.as_str()))
}

/// Reduce `sheet` in place.
///
/// - every at-rule is removed
/// - palette-probe helper rules are removed
/// - declarations that are not theme-colored are removed
/// - rules left without declarations are removed
pub fn reduce(sheet: &mut Stylesheet, theme_colors: &[String]) {
    sheet.nodes.retain_mut(|node| match node {
        Node::AtRule(_) => false,
        Node::Rule(rule) => {
            if rule.selector.starts_with(PALETTE_PROBE_PREFIX) {
                return false;
            }
            rule.declarations
                .retain(|decl| is_theme_declaration(decl, theme_colors));
            !rule.declarations.is_empty()
        }
    });
}

/// Parse, reduce and re-serialize compiled CSS.
pub fn reduce_css(css: &str, theme_colors: &[String]) -> String {
    let mut sheet = parse_stylesheet(css);
    reduce(&mut sheet, theme_colors);
    sheet.to_string()
}
