//! theme-generator CLI - Main entry point
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use theme_generator::{
    Dialect, GrassCompiler, LesscCompiler, StyleCompiler, ThemeConfig, ThemeGenerator,
    is_valid_color, scan_variables,
};

#[derive(Parser)]
#[command(name = "theme-generator")]
#[command(version)]
#[command(about = "Generate runtime-overridable theme stylesheets from Less or SCSS sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a theme stylesheet
    Generate(GenerateArgs),

    /// Print the variables declared in a file as JSON
    Variables {
        /// Variable file to scan
        file: PathBuf,

        /// Source language of the file
        #[arg(long, value_enum, default_value = "less")]
        dialect: DialectArg,
    },

    /// Check whether a value is a valid color literal
    CheckColor {
        /// Value to check, e.g. '#1890ff' or 'rgba(0, 0, 0, 0.5)'
        value: String,
    },
}

#[derive(Args, Debug, Default)]
struct GenerateArgs {
    /// JSON or YAML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the style files to reduce
    #[arg(long)]
    styles_dir: Option<PathBuf>,

    /// Variable declaration file
    #[arg(long)]
    var_file: Option<PathBuf>,

    /// Write the theme to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Theme variable (can be specified multiple times)
    #[arg(long = "theme-variable", value_name = "NAME")]
    theme_variables: Vec<String>,

    /// Glob restricting the style files (can be specified multiple times)
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Additional color variable file
    #[arg(long)]
    color_file: Option<PathBuf>,

    /// Pattern selecting theme variables from the color file
    #[arg(long, value_name = "RE")]
    color_file_theme_regex: Option<String>,

    /// Override a theme variable's value (NAME=VALUE)
    #[arg(long = "replace", value_name = "NAME=VALUE")]
    replacements: Vec<String>,

    /// Source language
    #[arg(long, value_enum)]
    dialect: Option<DialectArg>,

    /// Emit palette functions for numbered shade variables (Less only)
    #[arg(long)]
    shade_palette: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DialectArg {
    Less,
    Scss,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Less => Dialect::Less,
            DialectArg::Scss => Dialect::Scss,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the generated theme can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "theme_generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args).await,
        Commands::Variables { file, dialect } => {
            let source = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let variables = scan_variables(&source, dialect.into());
            println!("{}", serde_json::to_string_pretty(&variables)?);
            Ok(())
        }
        Commands::CheckColor { value } => {
            if is_valid_color(&value) {
                println!("{} is a valid color", value);
                Ok(())
            } else {
                bail!("{} is not a valid color", value)
            }
        }
    }
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let config = build_config(args).await?;
    debug!(config = ?config, "Generating theme");

    let compiler: Box<dyn StyleCompiler> = match config.dialect {
        Dialect::Less => Box::new(LesscCompiler::locate()?),
        Dialect::Scss => Box::new(GrassCompiler::new()),
    };

    let output = ThemeGenerator::new(compiler).generate(&config).await?;
    if config.output_file_path.is_none() {
        print!("{}", output);
    }
    Ok(())
}

/// Merge command-line flags over the configuration file, if any.
async fn build_config(args: GenerateArgs) -> Result<ThemeConfig> {
    let mut config = match &args.config {
        Some(path) => ThemeConfig::load(path).await?,
        None => {
            let styles_dir = args
                .styles_dir
                .clone()
                .ok_or_else(|| anyhow!("--styles-dir is required without --config"))?;
            let var_file = args
                .var_file
                .clone()
                .ok_or_else(|| anyhow!("--var-file is required without --config"))?;
            ThemeConfig::new(styles_dir, var_file)
        }
    };

    if let Some(styles_dir) = args.styles_dir {
        config.styles_dir = styles_dir;
    }
    if let Some(var_file) = args.var_file {
        config.var_file = var_file;
    }
    if let Some(output) = args.output {
        config.output_file_path = Some(output);
    }
    if !args.theme_variables.is_empty() {
        config.theme_variables = Some(args.theme_variables);
    }
    if !args.include.is_empty() {
        config.include = args.include;
    }
    if let Some(color_file) = args.color_file {
        config.color_file = Some(color_file);
    }
    if let Some(regex) = args.color_file_theme_regex {
        config.color_file_theme_regex = Some(regex);
    }
    for replacement in &args.replacements {
        let (name, value) = parse_replacement(replacement)?;
        config.theme_replacement.insert(name, value);
    }
    if let Some(dialect) = args.dialect {
        config.dialect = dialect.into();
    }
    if args.shade_palette {
        config.shade_palette = true;
    }

    Ok(config)
}

fn parse_replacement(text: &str) -> Result<(String, String)> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid replacement '{}' (expected NAME=VALUE)", text))?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        bail!("Invalid replacement '{}' (expected NAME=VALUE)", text);
    }
    Ok((name.to_string(), value.to_string()))
}
