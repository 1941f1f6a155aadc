use anyhow::{Context, Result};
use screener_sheets::config::Config;
use screener_sheets::pipeline::{self, RunMode};
use screener_sheets::screener::finviz::FinvizScreener;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.toml";

struct Args {
    config_path: PathBuf,
    dry_run: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG);
    let mut dry_run = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                config_path = PathBuf::from(path);
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(Args { config_path, dry_run })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("screener_sheets=info")),
        )
        .init();

    tracing::info!("starting daily stock screener");
    let code = match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    };
    tracing::info!("script execution completed");
    code
}

async fn run() -> Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();
    let config = Config::load_or_default(&args.config_path)?;

    let mode = if args.dry_run { RunMode::DryRun } else { RunMode::Export };
    let source = FinvizScreener::new(&config.screener)?;

    match pipeline::run(&config, &source, mode).await {
        Ok(summary) => {
            tracing::info!(
                queries = summary.queries,
                succeeded = summary.queries_succeeded,
                rows = summary.rows,
                "run finished"
            );
            Ok(())
        }
        Err(e) => {
            e.log();
            anyhow::bail!("run failed")
        }
    }
}
