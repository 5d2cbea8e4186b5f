use std::{collections::HashMap, fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use stencil_bundles::MessageBundles;
use stencil_engine::{Engine, EngineConfig};
use tracing::debug;

/// Render and check Stencil message bundles.
#[derive(Parser, Debug)]
#[command(name = "stencil", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one message
    Render(RenderArgs),
    /// Validate bundles and the templates that use them
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Bundle definition files (YAML or JSON)
    #[arg(long = "bundle", required = true)]
    bundles: Vec<PathBuf>,

    /// Message key, optionally prefixed with the bundle name (`msg:hello`)
    #[arg(long)]
    key: String,

    /// Locale of a localized bundle to prefer
    #[arg(long)]
    locale: Option<String>,

    /// Message parameter as `name=value`; values are parsed as JSON when possible
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Engine configuration file; defaults to the standard location
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Bundle definition files (YAML or JSON)
    #[arg(long = "bundle", required = true)]
    bundles: Vec<PathBuf>,

    /// Additional templates to check; registered under their file stem
    #[arg(long = "template")]
    templates: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    match Cli::parse().command {
        Command::Render(args) => run_render(args),
        Command::Check(args) => run_check(args),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_render(args: RenderArgs) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => EngineConfig::load_from_path(path)?,
        None => EngineConfig::load()?,
    };
    let bundles = load_bundles(&args.bundles, &[], config)?;
    let (bundle, key) = split_key(&args.key, &bundles)?;
    let message = bundles
        .bundle(bundle)
        .and_then(|info| info.by_key(key))
        .with_context(|| format!("no message '{key}' in bundle '{bundle}'"))?;

    let provided: HashMap<String, Value> = args.params.into_iter().collect();
    let arguments = message
        .params
        .iter()
        .map(|param| provided.get(param).cloned().with_context(|| format!("missing --param {param}=<value>")))
        .collect::<Result<Vec<_>>>()?;
    for name in provided.keys().filter(|name| !message.params.contains(name)) {
        debug!(param = %name, "ignoring parameter not declared by the message");
    }

    let output = bundles.message(bundle, args.locale.as_deref(), key, &arguments)?;
    println!("{output}");
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let bundles = load_bundles(&args.bundles, &args.templates, EngineConfig::load()?)?;
    let diagnostics = bundles.validate();
    for diagnostic in &diagnostics {
        println!("{diagnostic}");
    }
    if diagnostics.is_empty() {
        println!("{} template(s) checked, no problems found", bundles.engine().template_ids().len());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn load_bundles(bundle_files: &[PathBuf], template_files: &[PathBuf], config: EngineConfig) -> Result<MessageBundles> {
    let mut builder = MessageBundles::builder();
    for path in bundle_files {
        builder = builder.load_file(path)?;
    }
    for path in template_files {
        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("template path has no usable file name: {}", path.display()))?;
        let source = fs::read_to_string(path).with_context(|| format!("Failed to read template: {}", path.display()))?;
        builder = builder.add_template(id, source);
    }
    Ok(builder.build(Engine::builder().add_defaults().config(config))?)
}

/// Splits `bundle:key`; a bare key needs exactly one loaded bundle.
fn split_key<'a>(raw: &'a str, bundles: &'a MessageBundles) -> Result<(&'a str, &'a str)> {
    if let Some((bundle, key)) = raw.split_once(':') {
        return Ok((bundle, key));
    }
    let mut names = bundles.bundles().map(|bundle| bundle.name.as_str());
    match (names.next(), names.next()) {
        (Some(only), None) => Ok((only, raw)),
        (None, _) => bail!("no bundles loaded"),
        (Some(_), Some(_)) => bail!("several bundles loaded; qualify the key as <bundle>:{raw}"),
    }
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}
