use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use fakechat::server::{serve, ServerConfig};
use fakechat::{FontConfig, MockupConfig, RenderRequest, Renderer, ThemeKind, WrapPolicy};

#[derive(Parser)]
#[command(name = "fakechat", version, about = "Fake chat screenshot renderer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Render a single mockup to a file
    Render(RenderArgs),
}

#[derive(Args)]
struct StyleArgs {
    /// Theme preset: lingo, night or plain
    #[arg(long, env = "FAKECHAT_THEME", default_value = "lingo", value_parser = parse_theme)]
    theme: ThemeKind,

    /// Font file to use instead of system fonts
    #[arg(long, env = "FAKECHAT_FONT")]
    font: Option<PathBuf>,

    /// Directory avatar paths are resolved in; without it only URLs and data URIs load
    #[arg(long, env = "FAKECHAT_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "FAKECHAT_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    #[arg(long, env = "FAKECHAT_OUTPUT_DIR", default_value = "Generated")]
    output_dir: PathBuf,

    /// Delete generated files older than this
    #[arg(long, env = "FAKECHAT_MAX_AGE_SECS", default_value_t = 30)]
    max_age_secs: u64,

    #[arg(long, env = "FAKECHAT_SWEEP_INTERVAL_SECS", default_value_t = 5)]
    sweep_interval_secs: u64,

    /// Render threads (defaults to the number of CPUs)
    #[arg(long, env = "FAKECHAT_WORKERS")]
    workers: Option<usize>,

    /// Base URL for image links, e.g. https://chat.example.com
    #[arg(long, env = "FAKECHAT_PUBLIC_BASE")]
    public_base: Option<String>,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum Wrap {
    /// 30-character chunks
    Fixed,
    /// Whole words by measured width
    Words,
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    message: String,

    /// Avatar URL, data URI or path
    #[arg(long)]
    profile: Option<String>,

    /// Wallpaper pattern seed
    #[arg(long, env = "FAKECHAT_SEED")]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Wrap::Fixed)]
    wrap: Wrap,

    /// Skip the palette-reduction pass
    #[arg(long)]
    no_palette: bool,

    /// Output file (defaults to the generated filename)
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    style: StyleArgs,
}

fn parse_theme(s: &str) -> Result<ThemeKind, String> {
    s.parse::<ThemeKind>().map_err(|e| e.to_string())
}

fn mockup_config(style: &StyleArgs) -> MockupConfig {
    let mut config = MockupConfig {
        theme: style.theme.theme(),
        fonts: FontConfig { path: style.font.clone(), ..FontConfig::default() },
        ..MockupConfig::default()
    };
    config.assets.base_dir = style.assets_dir.clone();
    config
}

/// Split a local avatar path into the directory to confine loading to and
/// the file name inside it. URLs and data URIs are left alone.
fn local_profile(profile: &str) -> Option<(PathBuf, String)> {
    if profile.starts_with("data:") || profile.contains("://") {
        return None;
    }
    let path = Path::new(profile);
    let name = path.file_name()?.to_str()?.to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}

fn run_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = MockupConfig {
        wrap: match args.wrap {
            Wrap::Fixed => WrapPolicy::default(),
            Wrap::Words => WrapPolicy::WordWidth,
        },
        palette_reduction: !args.no_palette,
        pattern_seed: args.seed,
        ..mockup_config(&args.style)
    };

    // a profile given on the command line is the caller's own file
    let mut profile = args.profile;
    if config.assets.base_dir.is_none() {
        if let Some((dir, name)) = profile.as_deref().and_then(local_profile) {
            config.assets.base_dir = Some(dir);
            profile = Some(name);
        }
    }
    let renderer = Renderer::new(config).context("Failed to set up renderer")?;

    let mut request = RenderRequest::new(args.name, args.message);
    request.profile = profile;
    let image = renderer.render(&request)?;

    let out = args.out.unwrap_or_else(|| PathBuf::from(&image.filename));
    std::fs::write(&out, &image.bytes).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig {
        bind: args.bind,
        output_dir: args.output_dir,
        max_age: Duration::from_secs(args.max_age_secs),
        sweep_interval: Duration::from_secs(args.sweep_interval_secs),
        workers: args.workers.unwrap_or_else(num_cpus::get),
        public_base: args.public_base,
    };
    let mockup = mockup_config(&args.style);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(config, mockup))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Serve(args) => run_serve(args),
        Command::Render(args) => run_render(args),
    }
}
