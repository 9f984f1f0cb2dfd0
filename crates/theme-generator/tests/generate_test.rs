//! Integration tests for the theme generation pipeline.
//!
//! Tests run the whole pipeline against a small Less project with a fake
//! compiler that only understands what the fixtures use:
//! - top-level `@name: value;` declarations and references to them
//! - relative `@import "file";` statements
//! - plain rules, re-serialized through the crate's stylesheet model

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pretty_assertions::assert_eq;
use regex::{Captures, Regex};
use tempfile::TempDir;
use theme_generator::{
    CompileOptions, StyleCompiler, ThemeConfig, ThemeError, ThemeGenerator, generate_theme,
    parse_stylesheet,
};

static DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@([\w-]+)\s*:\s*(.*?);\s*$").unwrap());
static IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*@import\s+["']([^"']+)["'];?\s*$"#).unwrap());
static REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([\w-]+)").unwrap());
static UNDEFINED: Lazy<Regex> = Lazy::new(|| Regex::new(r":[^;{}]*@([\w-]+)").unwrap());

/// Resolves Less variables the way `lessc` would for flat stylesheets.
#[derive(Default)]
struct FakeLess {
    calls: AtomicUsize,
}

impl FakeLess {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn inline_imports(source: &str, options: &CompileOptions) -> Result<String, String> {
        let mut out = Vec::new();
        for line in source.lines() {
            let Some(caps) = IMPORT.captures(line) else {
                out.push(line.to_string());
                continue;
            };
            let target = &caps[1];
            let found = options.effective_search_paths().into_iter().find_map(|dir| {
                let path = dir.join(target);
                [path.clone(), path.with_extension("less")]
                    .into_iter()
                    .find(|p| p.is_file())
            });
            match found {
                Some(path) => out.push(fs::read_to_string(path).map_err(|e| e.to_string())?),
                None => return Err(format!("'{}' wasn't found", target)),
            }
        }
        Ok(out.join("\n"))
    }

    fn render(source: &str, options: &CompileOptions) -> Result<String, String> {
        let source = Self::inline_imports(source, options)?;

        if source.matches('{').count() != source.matches('}').count() {
            return Err("Unrecognised input. Possibly missing '}'".to_string());
        }

        let mut variables: HashMap<String, String> = HashMap::new();
        let mut body = Vec::new();
        for line in source.lines() {
            match DECLARATION.captures(line) {
                Some(caps) => {
                    variables.insert(caps[1].to_string(), caps[2].to_string());
                }
                None => body.push(line),
            }
        }

        let resolve = |text: &str| {
            let mut text = text.to_string();
            for _ in 0..8 {
                let next = REFERENCE
                    .replace_all(&text, |caps: &Captures| {
                        variables
                            .get(&caps[1])
                            .cloned()
                            .unwrap_or_else(|| caps[0].to_string())
                    })
                    .into_owned();
                if next == text {
                    break;
                }
                text = next;
            }
            text
        };

        let body = resolve(&body.join("\n"));
        if let Some(caps) = UNDEFINED.captures(&body) {
            return Err(format!("variable @{} is undefined", &caps[1]));
        }
        Ok(parse_stylesheet(&body).to_string())
    }
}

#[async_trait]
impl StyleCompiler for FakeLess {
    fn name(&self) -> &'static str {
        "fake-less"
    }

    async fn compile(&self, source: &str, options: &CompileOptions) -> theme_generator::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Self::render(source, options).map_err(|message| ThemeError::CompilationFailed { message })
    }
}

const VARS: &str = "\
@primary-color: #1890ff;
@link-color: @primary-color;
@text-color: rgba(0, 0, 0, 0.85);
@font-size-base: 14px;
";

const BUTTON: &str = "\
@import \"../vars\";
.btn {
  font-size: @font-size-base;
  color: @primary-color;
  border: 1px solid @primary-color;
  border-radius: 2px;
}
.btn-link {
  color: @link-color;
  padding: 0;
}
@media (max-width: 575px) {
  .btn { color: @primary-color; }
}
";

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("styles/components")).unwrap();
        let project = Self { dir };
        project.write("styles/vars.less", VARS);
        project.write("styles/components/button.less", BUTTON);
        project
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn config(&self) -> ThemeConfig {
        ThemeConfig::new(self.path("styles"), self.path("styles/vars.less"))
            .with_theme_variables(["@primary-color"])
    }
}

fn assert_no_file(path: &Path) {
    assert!(!path.exists(), "{} should not exist", path.display());
}

#[tokio::test]
async fn test_generates_reduced_theme() {
    let project = Project::new();
    let output = generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();

    assert_eq!(
        output,
        "\
@primary-color: #1890ff;
@link-color: @primary-color;
@text-color: rgba(0, 0, 0, 0.85);
@font-size-base: 14px;
.btn {
  color: @primary-color;
  border: 1px solid @primary-color;
}
.btn-link {
  color: @primary-color;
}
"
    );
}

#[tokio::test]
async fn test_non_color_declarations_and_at_rules_are_dropped() {
    let project = Project::new();
    let output = generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();

    assert!(!output.contains("font-size: 14px"));
    assert!(!output.contains("border-radius"));
    assert!(!output.contains("padding"));
    assert!(!output.contains("@media"));
    assert!(!output.contains("#1890ff;\n}"));
}

#[tokio::test]
async fn test_replacement_only_changes_declaration() {
    let project = Project::new();
    let baseline = generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();
    let config = project.config().with_replacement("@primary-color", "#ff0000");
    let output = generate_theme(&FakeLess::default(), &config).await.unwrap();

    let (first, rest) = output.split_once('\n').unwrap();
    let (baseline_first, baseline_rest) = baseline.split_once('\n').unwrap();
    assert_eq!(first, "@primary-color: #ff0000;");
    assert_eq!(baseline_first, "@primary-color: #1890ff;");
    assert_eq!(rest, baseline_rest);
    assert!(!output.contains("#1890ff"));
}

#[tokio::test]
async fn test_inferred_theme_variables() {
    let project = Project::new();
    project.write(
        "styles/components/text.less",
        "@import \"../vars\";\n.text {\n  color: @text-color;\n  line-height: 1.5;\n}\n",
    );
    let mut config = project.config();
    config.theme_variables = None;

    let output = generate_theme(&FakeLess::default(), &config).await.unwrap();
    assert!(output.contains(".text {\n  color: @text-color;\n}"));
    // link-color resolves to the same literal as primary-color, which comes first
    assert!(output.contains(".btn-link {\n  color: @primary-color;\n}"));
    assert!(output.starts_with("@primary-color: #1890ff;\n@link-color: @primary-color;\n"));
}

#[tokio::test]
async fn test_output_file_created_with_parents() {
    let project = Project::new();
    let output_path = project.path("public/theme/color.less");
    let config = project.config().with_output_file(&output_path);

    let output = generate_theme(&FakeLess::default(), &config).await.unwrap();
    assert_eq!(fs::read_to_string(&output_path).unwrap(), output);
}

#[tokio::test]
async fn test_nothing_written_without_output_path() {
    let project = Project::new();
    generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();

    assert_no_file(&project.path("public"));
    let entries: Vec<_> = fs::read_dir(project.dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_failing_corpus_file_does_not_abort() {
    let project = Project::new();
    let expected = generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();

    project.write("styles/components/broken.less", ".broken {\n  color: #1890ff;\n");
    project.write("styles/components/undefined.less", ".x {\n  color: @nope;\n}\n");
    let output = generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();

    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_variable_source_failure_is_fatal() {
    let project = Project::new();
    let output_path = project.path("out/color.less");
    project.write("styles/vars.less", "@primary-color: #1890ff;\n.oops {\n");
    let config = project.config().with_output_file(&output_path);

    let result = generate_theme(&FakeLess::default(), &config).await;
    assert!(matches!(result, Err(ThemeError::CompilationFailed { .. })));
    assert_no_file(&output_path);
}

#[tokio::test]
async fn test_missing_var_file_is_read_error() {
    let project = Project::new();
    let config = ThemeConfig::new(project.path("styles"), project.path("styles/missing.less"));

    let result = generate_theme(&FakeLess::default(), &config).await;
    assert!(matches!(result, Err(ThemeError::Read { .. })));
}

#[tokio::test]
async fn test_cache_hit_and_invalidation() {
    let project = Project::new();
    let compiler = FakeLess::default();
    let generator = ThemeGenerator::new(&compiler);
    let config = project.config();

    let first = generator.generate(&config).await.unwrap();
    let calls = compiler.calls();
    assert!(calls > 0);

    let second = generator.generate(&config).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(compiler.calls(), calls);

    project.write(
        "styles/components/button.less",
        &BUTTON.replace("padding: 0;", "background: @primary-color;"),
    );
    let third = generator.generate(&config).await.unwrap();
    assert!(compiler.calls() > calls);
    assert!(third.contains(".btn-link {\n  color: @primary-color;\n  background: @primary-color;\n}"));

    generator.clear_cache();
    let before = compiler.calls();
    generator.generate(&config).await.unwrap();
    assert!(compiler.calls() > before);
}

#[tokio::test]
async fn test_cache_invalidated_by_imported_file_change() {
    let project = Project::new();
    project.write("palette.less", "@brand: #1890ff;\n");
    project.write(
        "styles/components/card.less",
        "@import \"../../palette\";\n.card {\n  border-color: @brand;\n}\n",
    );
    let compiler = FakeLess::default();
    let generator = ThemeGenerator::new(&compiler);
    let config = project.config();

    let first = generator.generate(&config).await.unwrap();
    assert!(first.contains(".card {\n  border-color: @primary-color;\n}"));
    let calls = compiler.calls();

    // Only the imported file changes; card.less itself is untouched
    project.write("palette.less", "@brand: #000000;\n");
    let second = generator.generate(&config).await.unwrap();
    assert!(compiler.calls() > calls);
    assert!(!second.contains(".card"));

    let fresh = generate_theme(&FakeLess::default(), &config).await.unwrap();
    assert_eq!(second, fresh);
}

#[tokio::test]
async fn test_include_restricts_corpus() {
    let project = Project::new();
    project.write(
        "styles/components/card.less",
        "@import \"../vars\";\n.card {\n  border-color: @primary-color;\n}\n",
    );

    let all = generate_theme(&FakeLess::default(), &project.config())
        .await
        .unwrap();
    assert!(all.contains(".card {"));

    let config = project.config().with_include(["components/button.less"]);
    let only_button = generate_theme(&FakeLess::default(), &config).await.unwrap();
    assert!(!only_button.contains(".card"));
    assert!(only_button.contains(".btn {"));
}

#[tokio::test]
async fn test_color_file_custom_properties() {
    let project = Project::new();
    project.write("colors.less", "@primary-1: #e6f7ff;\n@primary-6: #1890ff;\n@gray-1: #ffffff;\n");
    project.write(
        "styles/components/alert.less",
        "@import \"../../colors\";\n.alert {\n  background: var(--primary-1);\n  border-color: var(--gray-1, #fff);\n}\n",
    );
    let config = project
        .config()
        .with_theme_variables(["@primary-color", "@primary-1"])
        .with_color_file(project.path("colors.less"));

    let output = generate_theme(&FakeLess::default(), &config).await.unwrap();

    assert!(output.starts_with("@primary-color: #1890ff;\n@primary-1: #e6f7ff;\n"));
    assert!(output.contains(".alert {\n  background: @primary-1;\n}"));
    // gray-1 is declared in the color file but isn't a theme color
    assert!(!output.contains("@gray-1"));
}

#[tokio::test]
async fn test_shade_palette() {
    let project = Project::new();
    project.write("colors.less", "@primary-5: #40a9ff;\n");
    project.write(
        "styles/components/link.less",
        "@import \"../vars\";\n@import \"../../colors\";\na:hover {\n  color: @primary-5;\n}\n",
    );
    let config = project
        .config()
        .with_theme_variables(["@primary-color", "@primary-5"])
        .with_color_file(project.path("colors.less"))
        .with_shade_palette(true);

    let output = generate_theme(&FakeLess::default(), &config).await.unwrap();
    assert!(output.contains("a:hover {\n  color: color(~`colorPalette(\"@{primary-color}\", 5)`);\n}"));
}
