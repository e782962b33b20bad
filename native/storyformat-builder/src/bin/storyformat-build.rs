use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use storyformat_builder::{ExclusionSet, Pipeline, PipelineOptions};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "storyformat-build",
    about = "Build a Twine story format into a single format.js"
)]
struct Cli {
    /// Absolute URL prefix for source-map references (e.g. a dev server).
    source_map_prefix: Option<String>,

    /// Project root containing package.json.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Output directory, relative to the root.
    #[arg(long, default_value = "build")]
    out_dir: PathBuf,

    /// Project manifest, relative to the root.
    #[arg(long, default_value = "package.json")]
    manifest: PathBuf,

    /// Manifest keys kept out of the build constants. Replaces the defaults.
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    #[arg(long)]
    editor_entry: Option<PathBuf>,

    #[arg(long)]
    player_entry: Option<PathBuf>,

    #[arg(long)]
    player_html: Option<PathBuf>,

    #[arg(long)]
    format_entry: Option<PathBuf>,

    /// Raise the log level (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::new(&self.root)
            .with_source_map_prefix(self.source_map_prefix.clone());
        options.out_dir = self.out_dir.clone();
        options.manifest = self.manifest.clone();
        if !self.exclude.is_empty() {
            options.exclusions = ExclusionSet::new(self.exclude.iter().cloned());
        }
        if let Some(path) = &self.editor_entry {
            options.editor_entry = path.clone();
        }
        if let Some(path) = &self.player_entry {
            options.player_entry = path.clone();
        }
        if let Some(path) = &self.player_html {
            options.player_html = path.clone();
        }
        if let Some(path) = &self.format_entry {
            options.format_entry = path.clone();
        }
        options
    }
}

fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let options = cli.options();
    let root = options.root.display().to_string();
    let report = Pipeline::new(options)
        .run()
        .with_context(|| format!("failed to build story format in {root}"))?;
    print!("{report}");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.level());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
