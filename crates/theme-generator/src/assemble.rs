//! Theme assembly pipeline.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A run goes through these stages:
//!
//! 1. Resolve the variable map from the variable file, the main file and the
//!    color file.
//! 2. Resolve the theme variable set.
//! 3. Probe-compile one marker rule per theme variable to learn the literal
//!    color each one resolves to.
//! 4. Compile the variable source and every corpus file.
//! 5. Reduce the compiled corpus to theme-colored declarations.
//! 6. Substitute the literal colors back with variable references.
//! 7. Prefix the variable source and the final theme declarations.
//!
//! Only compile failures on the variable source or the probe, and filesystem
//! failures on required inputs or the output, abort a run. A corpus file that
//! fails to read or compile is logged and skipped.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};
use tracing::{debug, info, warn};

use crate::bundle::bundle_file;
use crate::cache::{ThemeCache, fingerprint};
use crate::compiler::{CompileOptions, StyleCompiler};
use crate::config::ThemeConfig;
use crate::dialect::Dialect;
use crate::error::{Result, ThemeError};
use crate::files::discover_style_files;
use crate::matcher::{ColorCorrespondence, extract_marker_colors};
use crate::reduce::reduce_css;
use crate::variables::{VariableMap, build_variable_map, merge};

/// `var(--name)` or `var(--name, fallback)`.
static CUSTOM_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\(\s*--([\w-]+)\s*(?:,[^)]*)?\)").unwrap());

/// Numbered shade marker, e.g. `primary-6`.
static SHADE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)-(\d+)$").unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n)+").unwrap());

/// Generates theme stylesheets with a given compiler, remembering the last
/// successful result.
pub struct ThemeGenerator<C> {
    compiler: C,
    cache: Mutex<ThemeCache>,
}

/// A corpus file and its content, `None` when it couldn't be read.
struct CorpusFile {
    path: PathBuf,
    source: Option<String>,
    /// Content with local imports inlined; what the fingerprint covers
    bundled: Option<String>,
}

/// Variable sources after step 1.
struct ResolvedVariables {
    /// Bundled variable file followed by declarations for overridden values
    prelude: String,
    variables: VariableMap,
    /// Every variable declared in the color file
    color_variables: VariableMap,
}

impl<C: StyleCompiler> ThemeGenerator<C> {
    pub fn new(compiler: C) -> Self {
        Self {
            compiler,
            cache: Mutex::new(ThemeCache::new()),
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Forget the last result.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Generate the theme stylesheet described by `config`.
    ///
    /// Returns the stylesheet text, which is also written to
    /// `config.output_file_path` when set. When the configuration and every
    /// input file are unchanged since the last successful run, the previous
    /// result is returned without compiling.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::Read`] if a required input can't be read
    /// - [`ThemeError::CompilationFailed`] if the variable source or the probe
    ///   doesn't compile
    /// - [`ThemeError::Write`] if the output file can't be written
    /// - [`ThemeError::InvalidPattern`] for a malformed include glob or color
    ///   file expression
    pub async fn generate(&self, config: &ThemeConfig) -> Result<String> {
        let dialect = config.dialect;

        let var_source = bundle(&config.var_file, dialect).await?;
        let main_source = match &config.main_less_file {
            Some(path) => Some(bundle(path, dialect).await?),
            None => None,
        };
        let color_source = match &config.color_file {
            Some(path) => Some(read_required(path).await?),
            None => None,
        };
        let corpus = read_corpus(config).await?;

        let fingerprint = {
            let mut inputs = vec![(config.var_file.clone(), var_source.clone())];
            if let (Some(path), Some(source)) = (&config.main_less_file, &main_source) {
                inputs.push((path.clone(), source.clone()));
            }
            if let (Some(path), Some(source)) = (&config.color_file, &color_source) {
                inputs.push((path.clone(), source.clone()));
            }
            for file in &corpus {
                inputs.push((file.path.clone(), file.bundled.clone().unwrap_or_default()));
            }
            fingerprint(config, &inputs)
        };

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(&fingerprint)
            .map(str::to_string);
        if let Some(output) = cached {
            debug!(fingerprint = %fingerprint, "Theme inputs unchanged, returning cached result");
            return Ok(output);
        }

        let resolved = resolve_variables(
            config,
            var_source,
            main_source.as_deref(),
            color_source.as_deref(),
        )?;
        let theme_variables = resolve_theme_variables(config, &resolved.variables);
        debug!(
            variables = resolved.variables.len(),
            theme_variables = theme_variables.len(),
            "Resolved theme variables"
        );

        let correspondence = self
            .probe(config, &resolved.prelude, &theme_variables)
            .await?;
        debug!(markers = correspondence.len(), "Probe compiled");

        let compiled = self.compile_corpus(config, &resolved, &corpus).await?;
        let reduced = reduce_css(&compiled, &correspondence.colors());

        let substituted = resubstitute(
            &reduced,
            &correspondence,
            &resolved.variables,
            dialect,
            config.shade_palette,
        );
        let output = finalize(
            &substituted,
            &resolved.prelude,
            &theme_variables,
            &resolved.variables,
            config,
        );

        if let Some(path) = &config.output_file_path {
            write_output(path, &output).await?;
            info!(output = %path.display(), "Theme generated");
        } else {
            info!("Theme generated");
        }

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .store(fingerprint, output.clone());

        Ok(output)
    }

    /// Compile the marker probe and collect the resolved colors of the
    /// theme variables.
    async fn probe(
        &self,
        config: &ThemeConfig,
        prelude: &str,
        theme_variables: &[String],
    ) -> Result<ColorCorrespondence> {
        let source = probe_source(prelude, theme_variables, config.dialect);
        let options = CompileOptions::new(vec![config.styles_dir.clone()])
            .with_filename(&config.var_file)
            .with_compiler_options(config.options.clone());

        let css = self.compiler.compile(&source, &options).await?;

        let markers: HashSet<&str> = theme_variables
            .iter()
            .map(|name| config.dialect.bare_name(name))
            .collect();
        let mut correspondence = extract_marker_colors(&css);
        correspondence.retain(|marker| markers.contains(marker));
        Ok(correspondence)
    }

    /// Compile every corpus file concurrently, followed by the variable
    /// source. Returns the concatenated CSS.
    async fn compile_corpus(
        &self,
        config: &ThemeConfig,
        resolved: &ResolvedVariables,
        corpus: &[CorpusFile],
    ) -> Result<String> {
        let var_options = CompileOptions::new(vec![config.styles_dir.clone()])
            .with_filename(&config.var_file)
            .with_compiler_options(config.options.clone());
        let var_css = self.compiler.compile(&resolved.prelude, &var_options).await?;

        debug!(files = corpus.len(), compiler = self.compiler.name(), "Compiling corpus");
        let compiler = &self.compiler;
        let compiles = corpus.iter().map(|file| async move {
            let Some(source) = &file.source else {
                return "\n".to_string();
            };
            let source =
                rewrite_custom_properties(source, &resolved.color_variables, config.dialect);
            let options = CompileOptions::new(vec![config.styles_dir.clone()])
                .with_filename(&file.path)
                .with_compiler_options(config.options.clone());

            match compiler.compile(&source, &options).await {
                Ok(css) => css,
                Err(e) => {
                    warn!(file = %file.path.display(), error = %e, "Skipping style file that failed to compile");
                    "\n".to_string()
                }
            }
        });
        let outputs = join_all(compiles).await;

        Ok(format!("{}\n{}", outputs.join("\n"), var_css))
    }
}

/// Generate a theme with `compiler` and no result cache.
pub async fn generate_theme<C: StyleCompiler>(compiler: &C, config: &ThemeConfig) -> Result<String> {
    ThemeGenerator::new(compiler).generate(config).await
}

/// [`bundle_file`] on the blocking pool.
async fn bundle(path: &Path, dialect: Dialect) -> Result<String> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || bundle_file(&owned, dialect))
        .await
        .map_err(|e| ThemeError::Io(std::io::Error::other(e)))?
}

async fn read_required(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ThemeError::read(path, e))
}

async fn read_corpus(config: &ThemeConfig) -> Result<Vec<CorpusFile>> {
    let paths = discover_style_files(&config.styles_dir, &config.include, config.dialect)?;

    let mut corpus = Vec::with_capacity(paths.len());
    for path in paths {
        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable style file");
                None
            }
        };
        let bundled = match &source {
            Some(source) => match bundle(&path, config.dialect).await {
                Ok(bundled) => Some(bundled),
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "Fingerprinting style file without its imports");
                    Some(source.clone())
                }
            },
            None => None,
        };
        corpus.push(CorpusFile { path, source, bundled });
    }
    Ok(corpus)
}

async fn write_output(path: &Path, output: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ThemeError::write(path, e))?;
    }
    tokio::fs::write(path, output)
        .await
        .map_err(|e| ThemeError::write(path, e))
}

/// Build the variable map and the variable prelude.
///
/// Values from the main file and theme-relevant values from the color file
/// override the variable file. Overridden or added values are declared after
/// the bundled variable source so the compiler sees them too.
fn resolve_variables(
    config: &ThemeConfig,
    var_source: String,
    main_source: Option<&str>,
    color_source: Option<&str>,
) -> Result<ResolvedVariables> {
    let dialect = config.dialect;
    let base = build_variable_map(&var_source, dialect);

    let mut overlay = VariableMap::new();
    if let Some(source) = main_source {
        overlay.extend(build_variable_map(source, dialect));
    }

    let color_variables = match color_source {
        Some(source) => {
            let selection = config.color_file_theme_regex()?;
            let all = build_variable_map(source, dialect);
            overlay.extend(
                all.iter()
                    .filter(|(name, _)| selection.is_match(name))
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
            all
        }
        None => VariableMap::new(),
    };

    let overrides: Vec<String> = overlay
        .iter()
        .filter(|(name, value)| base.get(*name) != Some(*value))
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect();

    let prelude = if overrides.is_empty() {
        var_source
    } else {
        format!("{}\n{}", var_source, overrides.join("\n"))
    };

    Ok(ResolvedVariables {
        prelude,
        variables: merge(base, overlay),
        color_variables,
    })
}

/// The ordered theme variable names for a run.
///
/// Explicit names are taken as given; otherwise every known variable except
/// the excluded ones. An empty list falls back to the dialect's default
/// variable. Names missing from `variables` are dropped.
fn resolve_theme_variables(config: &ThemeConfig, variables: &VariableMap) -> Vec<String> {
    let mut names: Vec<String> = match &config.theme_variables {
        Some(names) => names.clone(),
        None => variables
            .keys()
            .filter(|name| !config.exclude_variables.contains(name))
            .cloned()
            .collect(),
    };
    if names.is_empty() {
        names.push(config.dialect.default_theme_variable());
    }

    let mut seen = HashSet::new();
    names.retain(|name| variables.contains_key(name) && seen.insert(name.clone()));
    names
}

/// The variable prelude followed by one marker rule per theme variable.
fn probe_source(prelude: &str, theme_variables: &[String], dialect: Dialect) -> String {
    let mut source = String::from(prelude);
    source.push('\n');
    for name in theme_variables {
        source.push_str(&format!(".{} {{ color: {}; }}\n", dialect.bare_name(name), name));
    }
    source
}

/// Replace `var(--name)` with a variable reference when the color file
/// declares that variable.
fn rewrite_custom_properties<'a>(
    source: &'a str,
    color_variables: &VariableMap,
    dialect: Dialect,
) -> Cow<'a, str> {
    if color_variables.is_empty() {
        return Cow::Borrowed(source);
    }
    CUSTOM_PROPERTY.replace_all(source, |caps: &Captures| {
        let name = dialect.variable(&caps[1]);
        if color_variables.contains_key(&name) {
            name
        } else {
            caps[0].to_string()
        }
    })
}

/// Pattern matching a literal color, not as the prefix of a longer literal.
fn color_pattern(color: &str) -> Option<Regex> {
    let mut pattern = regex::escape(color);
    if color.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern).ok()
}

/// The palette-function expression for a numbered shade marker, e.g.
/// `primary-6` → ``color(~`colorPalette("@{primary-color}", 6)`)``.
fn shade_expression(marker: &str, variables: &VariableMap, dialect: Dialect) -> Option<String> {
    let captures = SHADE_MARKER.captures(marker)?;
    let base = &captures[1];
    let index = &captures[2];

    let color_name = format!("{}-color", base);
    let seed = if variables.contains_key(&dialect.variable(&color_name)) {
        color_name.as_str()
    } else {
        base
    };
    Some(format!("color(~`colorPalette(\"@{{{}}}\", {})`)", seed, index))
}

/// Replace every literal theme color in `css` with the reference of the
/// variable it came from.
fn resubstitute(
    css: &str,
    correspondence: &ColorCorrespondence,
    variables: &VariableMap,
    dialect: Dialect,
    shade_palette: bool,
) -> String {
    let use_shades = shade_palette && dialect.supports_inline_functions();
    let mut css = css.to_string();

    for (marker, color) in correspondence.iter() {
        let reference = use_shades
            .then(|| shade_expression(marker, variables, dialect))
            .flatten()
            .unwrap_or_else(|| dialect.variable(marker));
        if let Some(pattern) = color_pattern(color) {
            css = pattern.replace_all(&css, NoExpand(&reference)).into_owned();
        }
    }
    css
}

/// Prefix the variable prelude and the final theme declarations.
fn finalize(
    css: &str,
    prelude: &str,
    theme_variables: &[String],
    variables: &VariableMap,
    config: &ThemeConfig,
) -> String {
    let mut output = format!("{}\n{}", prelude, css);

    for name in theme_variables.iter().rev() {
        let declaration = format!(r"(?m)^[ \t]*{}[ \t]*:.*;[ \t]*$", regex::escape(name));
        if let Ok(pattern) = Regex::new(&declaration) {
            output = pattern.replace_all(&output, "").into_owned();
        }

        let value = config
            .theme_replacement
            .get(name)
            .or_else(|| variables.get(name))
            .map(String::as_str)
            .unwrap_or_default();
        output = format!("{}: {};\n{}", name, value, output);
    }

    let collapsed = BLANK_LINES.replace_all(&output, "\n");
    let mut result = dedupe_entries(collapsed.trim_start_matches('\n'));
    if !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Remove repeated top-level entries, keeping the first.
///
/// An entry is a single line at brace depth zero or a whole brace-balanced
/// block.
fn dedupe_entries(text: &str) -> String {
    let mut entries: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut depth: i64 = 0;

    for line in text.lines() {
        current.push(line);
        depth += line.matches('{').count() as i64;
        depth -= line.matches('}').count() as i64;
        if depth <= 0 {
            entries.push(current.join("\n"));
            current.clear();
            depth = 0;
        }
    }
    if !current.is_empty() {
        entries.push(current.join("\n"));
    }

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| entry.trim().is_empty() || seen.insert(entry.clone()))
        .collect::<Vec<_>>()
        .join("\n")
}
