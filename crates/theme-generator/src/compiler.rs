//! Style compiler adapter.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The pipeline never evaluates variable algebra, functions or imports itself;
//! it asks a compiler. [`StyleCompiler`] is that capability: source text and
//! options in, plain CSS out.
//!
//! Two backends are provided:
//! - [`LesscCompiler`]: the external `lessc` binary (Less)
//! - [`GrassCompiler`]: the pure Rust `grass` crate (SCSS)
//!
//! Both apply the same defaults on top of the caller's options:
//! - inline function evaluation enabled, so palette helpers in probe text resolve
//! - package-relative imports (`@import "~pkg/file"`) resolved against the
//!   module root's `node_modules`

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Result, ThemeError};

/// Prefix marking package-relative imports.
pub const DEFAULT_IMPORT_PREFIX: &str = "~";

/// `@import` statement with optional Less import options; captures the
/// leading part, the quote and the path.
static IMPORT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(@import\s*(?:\([^)]*\)\s*)?)(["'])([^"']+)["']"#).unwrap());

/// Caller-supplied compiler options, passed to every compile call.
///
/// Unset fields fall back to the adapter defaults. Unknown keys are kept in
/// `extra` and forwarded to `lessc` as command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Inline JavaScript evaluation. Enabled unless explicitly set to `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript_enabled: Option<bool>,

    /// Prefix marking package-relative imports (default `~`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_prefix: Option<String>,

    /// Directory whose `node_modules` package-relative imports resolve
    /// against (default: the current directory).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_root: Option<PathBuf>,

    /// Additional backend flags (`lessc --key=value`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CompilerOptions {
    pub fn javascript_enabled(&self) -> bool {
        self.javascript_enabled.unwrap_or(true)
    }

    pub fn import_prefix(&self) -> &str {
        self.import_prefix.as_deref().unwrap_or(DEFAULT_IMPORT_PREFIX)
    }

    /// The `node_modules` directory package imports resolve against, if it exists.
    pub fn package_dir(&self) -> Option<PathBuf> {
        let root = match &self.module_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().ok()?,
        };
        let dir = root.join("node_modules");
        dir.is_dir().then_some(dir)
    }
}

/// Options for a single compile call.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Directories searched for `@import` resolution
    pub search_paths: Vec<PathBuf>,
    /// The file the source was read from, if any
    pub filename: Option<PathBuf>,
    /// Caller options merged over the adapter defaults
    pub compiler: CompilerOptions,
}

impl CompileOptions {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_compiler_options(mut self, compiler: CompilerOptions) -> Self {
        self.compiler = compiler;
        self
    }

    /// Search paths including the package directory for `~` imports.
    pub fn effective_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.search_paths.clone();
        if let Some(parent) = self.filename.as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() && !paths.iter().any(|p| p == parent) {
                paths.push(parent.to_path_buf());
            }
        }
        if let Some(dir) = self.compiler.package_dir() {
            paths.push(dir);
        }
        paths
    }
}

/// A style compiler: source text plus options in, plain CSS out.
///
/// Implementations must be pure with respect to the pipeline: the same input
/// yields the same output. Failures carry the compiler's diagnostic in
/// [`ThemeError::CompilationFailed`].
#[async_trait]
pub trait StyleCompiler: Send + Sync {
    /// Backend name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Compile `source` to plain CSS.
    async fn compile(&self, source: &str, options: &CompileOptions) -> Result<String>;
}

#[async_trait]
impl<T: StyleCompiler + ?Sized> StyleCompiler for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn compile(&self, source: &str, options: &CompileOptions) -> Result<String> {
        (**self).compile(source, options).await
    }
}

#[async_trait]
impl<T: StyleCompiler + ?Sized> StyleCompiler for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn compile(&self, source: &str, options: &CompileOptions) -> Result<String> {
        (**self).compile(source, options).await
    }
}

/// Strip the package prefix from `@import` paths so they resolve through the
/// search paths (which include the module root's `node_modules`).
///
/// ```
/// use theme_generator::resolve_package_imports;
///
/// let source = r#"@import "~antd/lib/style/themes/default.less";"#;
/// assert_eq!(
///     resolve_package_imports(source, "~"),
///     r#"@import "antd/lib/style/themes/default.less";"#
/// );
/// ```
pub fn resolve_package_imports<'a>(source: &'a str, prefix: &str) -> Cow<'a, str> {
    if prefix.is_empty() || !source.contains(prefix) {
        return Cow::Borrowed(source);
    }
    IMPORT_PATH.replace_all(source, |caps: &Captures| {
        let path = &caps[3];
        let path = path.strip_prefix(prefix).unwrap_or(path);
        format!("{}{}{}{}", &caps[1], &caps[2], path, &caps[2])
    })
}

/// The external `lessc` compiler.
///
/// Source is piped through stdin; compiled CSS is read from stdout and a
/// non-zero exit turns stderr into the compilation diagnostic.
#[derive(Debug, Clone)]
pub struct LesscCompiler {
    binary: PathBuf,
}

impl LesscCompiler {
    /// Environment variable that may point at the `lessc` binary.
    pub const ENV_VAR: &'static str = "LESSC";

    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Find `lessc` via the `LESSC` environment variable, then `PATH`.
    pub fn locate() -> Result<Self> {
        if let Some(path) = std::env::var_os(Self::ENV_VAR).map(PathBuf::from) {
            if path.is_file() {
                return Ok(Self::new(path));
            }
        }
        which::which("lessc").map(Self::new).map_err(|e| {
            ThemeError::CompilerUnavailable(format!(
                "lessc not found (set {} or add it to PATH): {}",
                Self::ENV_VAR,
                e
            ))
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command-line arguments for one compile call. The source is read from stdin.
    fn arguments(options: &CompileOptions) -> Vec<String> {
        let mut args = Vec::new();

        if options.compiler.javascript_enabled() {
            args.push("--js".to_string());
        }

        let search_paths = options.effective_search_paths();
        if !search_paths.is_empty() {
            if let Ok(joined) = std::env::join_paths(&search_paths) {
                args.push(format!("--include-path={}", joined.to_string_lossy()));
            }
        }

        for (key, value) in &options.compiler.extra {
            match value {
                serde_json::Value::Bool(true) => args.push(format!("--{}", key)),
                serde_json::Value::Bool(false) | serde_json::Value::Null => {}
                serde_json::Value::String(s) => args.push(format!("--{}={}", key, s)),
                other => args.push(format!("--{}={}", key, other)),
            }
        }

        args.push("-".to_string());
        args
    }
}

#[async_trait]
impl StyleCompiler for LesscCompiler {
    fn name(&self) -> &'static str {
        "lessc"
    }

    async fn compile(&self, source: &str, options: &CompileOptions) -> Result<String> {
        let source = resolve_package_imports(source, options.compiler.import_prefix());

        let mut child = Command::new(&self.binary)
            .args(Self::arguments(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ThemeError::CompilerUnavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        // lessc reads all of stdin before writing anything; closing it starts the compile
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ThemeError::CompilationFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// SCSS compilation with the `grass` crate.
///
/// grass is synchronous, so each compile runs on a blocking worker thread;
/// concurrent corpus compiles therefore overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassCompiler;

impl GrassCompiler {
    pub fn new() -> Self {
        Self
    }
}

/// Compile SCSS source to expanded CSS.
fn compile_scss(scss: &str, load_paths: &[PathBuf]) -> Result<String> {
    let options = grass::Options::default()
        .load_paths(load_paths)
        .style(grass::OutputStyle::Expanded);

    grass::from_string(scss, &options).map_err(|e| ThemeError::CompilationFailed {
        message: e.to_string(),
    })
}

#[async_trait]
impl StyleCompiler for GrassCompiler {
    fn name(&self) -> &'static str {
        "grass"
    }

    async fn compile(&self, source: &str, options: &CompileOptions) -> Result<String> {
        let source = resolve_package_imports(source, options.compiler.import_prefix()).into_owned();
        let load_paths = options.effective_search_paths();

        match tokio::task::spawn_blocking(move || compile_scss(&source, &load_paths)).await {
            Ok(result) => result,
            Err(e) => Err(ThemeError::CompilationFailed {
                message: format!("grass worker failed: {}", e),
            }),
        }
    }
}
