use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, ArgGroup, Parser, ValueHint};
use peakbag::{BatchRunner, Config, Credentials, GpsBabel, HttpCatalog, Input};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Log peak ascents found in GPS track files", long_about = None)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .multiple(true)
        .args(["filename", "directory"])
))]
struct Cli {
    /// Catalog username
    #[arg(long, env = "PEAKBAG_USERNAME")]
    username: String,

    /// Catalog password
    #[arg(long, env = "PEAKBAG_PASSWORD", hide_env_values = true)]
    password: String,

    /// Base URL of the peak catalog API
    #[arg(long, env = "PEAKBAG_CATALOG_URL", value_hint = ValueHint::Url)]
    catalog_url: String,

    /// Single GPS track file to process (takes precedence over --directory)
    #[arg(long, value_hint = ValueHint::FilePath)]
    filename: Option<PathBuf>,

    /// Directory of GPS track files; progress is kept in history.json there
    #[arg(long, value_hint = ValueHint::DirPath)]
    directory: Option<PathBuf>,

    /// Build ascents but don't upload them
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Retry files that failed on an earlier run
    #[arg(long, action = ArgAction::SetTrue)]
    retry: bool,

    /// gpsbabel executable
    #[arg(long, default_value = "gpsbabel", value_hint = ValueHint::ExecutablePath)]
    gpsbabel: PathBuf,

    /// Maximum points kept per converted track
    #[arg(long, default_value_t = 2900)]
    simplify_count: usize,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let input = match (&self.filename, &self.directory) {
            (Some(file), _) => Input::File(file.clone()),
            (None, Some(dir)) => Input::Directory(dir.clone()),
            (None, None) => return Err(anyhow!("either --filename or --directory is required")),
        };
        Ok(Config {
            credentials: Credentials::new(&self.username, &self.password),
            input,
            dry_run: self.dry_run,
            retry_failures: self.retry,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    info!("Started!");
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    let catalog = HttpCatalog::new(cli.catalog_url.as_str())
        .context("failed to set up catalog client")?;
    let converter = GpsBabel::new(&cli.gpsbabel).with_simplify_count(cli.simplify_count);

    let mut runner = BatchRunner::connect(config, catalog, converter)?;
    let summary = runner.run()?;
    if summary.failed > 0 {
        info!(
            "{} file(s) failed; see history.json and rerun with --retry",
            summary.failed
        );
    }
    Ok(())
}
