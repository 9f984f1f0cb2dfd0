//! Variable map extraction from style sources.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Two extractors are provided:
//!
//! - [`build_variable_map`] is the strict, line-oriented extractor used by the
//!   pipeline. Only top-level, single-line declarations of the form
//!   `@name: value;` are recognised; everything else is skipped silently.
//! - [`scan_variables`] is a permissive scanner for simple files. It accepts
//!   indented declarations and values that span several lines.
//!
//! ```text
//! @primary-color: #1890ff;        → "@primary-color" = "#1890ff"
//! @link-color: @primary-color;    → "@link-color"    = "@primary-color"
//! @shadow: 0 1px 2px              → skipped by the strict extractor,
//!          rgba(0, 0, 0, 0.2);      captured by the permissive scanner
//! ```

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::Dialect;

/// Mapping from sigil-prefixed variable name to its raw textual value.
///
/// Insertion order is preserved. Re-inserting a name keeps its original
/// position and replaces the value.
pub type VariableMap = IndexMap<String, String>;

/// Strict declaration line: name, anything up to `:`, at least one space,
/// value, terminating `;`. The value runs to the last `;` on the line.
static LESS_DECLARATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(@[\w'-]+)[^:]*:[ ]+(.*);").unwrap());

static SCSS_DECLARATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\$[\w'-]+)[^:]*:[ ]+(.*);").unwrap());

/// Permissive declaration: may be indented, value may span lines.
static LESS_DECLARATION_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*(@['"]?[\w-]+['"]?)[ \t]*:\s*([^;{}]*);"#).unwrap());

static SCSS_DECLARATION_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*(\$['"]?[\w-]+['"]?)[ \t]*:\s*([^;{}]*);"#).unwrap());

fn declaration_line(dialect: Dialect) -> &'static Regex {
    match dialect {
        Dialect::Less => &LESS_DECLARATION_LINE,
        Dialect::Scss => &SCSS_DECLARATION_LINE,
    }
}

fn declaration_any(dialect: Dialect) -> &'static Regex {
    match dialect {
        Dialect::Less => &LESS_DECLARATION_ANY,
        Dialect::Scss => &SCSS_DECLARATION_ANY,
    }
}

/// Build a variable map from the declaration lines of `source`.
///
/// Only lines that start with the dialect's sigil and contain a `:` are
/// considered. Lines that don't match the declaration pattern are dropped.
/// Later declarations of the same name overwrite earlier ones.
///
/// # Example
///
/// ```
/// use theme_generator::{Dialect, build_variable_map};
///
/// let map = build_variable_map("@a: red;\n@b: @a;\n@a: blue;", Dialect::Less);
/// assert_eq!(map["@a"], "blue");
/// assert_eq!(map["@b"], "@a");
/// ```
pub fn build_variable_map(source: &str, dialect: Dialect) -> VariableMap {
    let sigil = dialect.sigil();
    let pattern = declaration_line(dialect);

    source
        .lines()
        .filter(|line| line.starts_with(sigil) && line.contains(':'))
        .filter_map(|line| pattern.captures(line))
        .fold(VariableMap::new(), |mut map, captures| {
            let name = captures[1].to_string();
            let value = captures[2].trim().to_string();
            map.insert(name, value);
            map
        })
}

/// Scan `source` for every variable declaration, including indented and
/// multi-line ones.
///
/// Quotes around names are removed and whitespace inside values is collapsed
/// to single spaces.
pub fn scan_variables(source: &str, dialect: Dialect) -> VariableMap {
    let mut map = VariableMap::new();
    for captures in declaration_any(dialect).captures_iter(source) {
        let name: String = captures[1].chars().filter(|c| !matches!(c, '\'' | '"')).collect();
        let value = captures[2].split_whitespace().collect::<Vec<_>>().join(" ");
        map.insert(name, value);
    }
    map
}

/// Merge `overlay` on top of `base`. Keys present in both take the overlay's value.
pub fn merge(mut base: VariableMap, overlay: VariableMap) -> VariableMap {
    base.extend(overlay);
    base
}
