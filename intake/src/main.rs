use clap::{Args, Parser};
use email_store::credentials::Credential;
use std::path::PathBuf;

mod config;
mod logging;
mod statsd;

use config::{Config, ConfigError};

#[derive(Parser)]
#[command(version, about = "Collects email sign-ups into Google Sheets or a local workbook")]
enum CliCommand {
    /// Start the HTTP intake server
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Optional YAML config file. Defaults apply when omitted.
    #[arg(long)]
    config_file_path: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(std::io::Error),
    #[error("server stopped: {0}")]
    Server(#[from] email_store::api::ApiError),
}

fn main() -> Result<(), CliError> {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let env = |name: &str| std::env::var(name).ok();

    let config = Config::load(args.config_file_path.as_deref(), env)?;
    let _sentry = logging::init(config.logging.as_ref());
    statsd::init(config.metrics.as_ref())?;

    let credential = Credential::from_env(env);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(email_store::run(config.store, credential))?;
    Ok(())
}
