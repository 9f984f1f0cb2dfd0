//! Theme stylesheet generation for Less and SCSS projects.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! This crate derives a small, runtime-overridable theme stylesheet from a
//! larger style corpus:
//! - Variable maps parsed from variable-declaration sources
//! - A probe compile that learns which literal colors theme variables resolve to
//! - Reduction of the compiled corpus to theme-colored declarations
//! - Back-substitution of literal colors with variable references
//!
//! The style compiler itself is an injected capability ([`StyleCompiler`]),
//! with `lessc` and `grass` backends provided.

mod assemble;
mod bundle;
mod cache;
mod color;
mod compiler;
mod config;
mod dialect;
mod error;
mod files;
mod matcher;
mod reduce;
mod stylesheet;
mod variables;

pub use assemble::{ThemeGenerator, generate_theme};
pub use bundle::bundle_file;
pub use cache::{ThemeCache, fingerprint};
pub use color::is_valid_color;
pub use compiler::{
    CompileOptions, CompilerOptions, GrassCompiler, LesscCompiler, StyleCompiler,
    resolve_package_imports,
};
pub use config::{DEFAULT_COLOR_FILE_THEME_REGEX, ThemeConfig};
pub use dialect::Dialect;
pub use error::{Result, ThemeError};
pub use files::discover_style_files;
pub use matcher::{ColorCorrespondence, extract_marker_colors};
pub use reduce::{PALETTE_PROBE_PREFIX, is_color_declaration, reduce, reduce_css};
pub use stylesheet::{AtRule, Declaration, Node, StyleRule, Stylesheet, parse_stylesheet};
pub use variables::{VariableMap, build_variable_map, merge, scan_variables};
