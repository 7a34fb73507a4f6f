use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crash_gifts::{
    GameConfig,
    config::resolve_path,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
    prelude::*,
};

mod client;
mod ui;

const DEFAULT_LOG_DIR: &str = "~/.crash-gifts/logs";
const FRAME: Duration = Duration::from_millis(50);

struct CliArgs {
    seed: Option<u64>,
    config: Option<PathBuf>,
    log_dir: PathBuf,
}

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: crash-gifts [--seed <u64>] [--config <path>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --seed <u64>        Seed the simulation for a reproducible session\n\
           --config <path>     JSON file overriding game tunables\n\
           --log-dir <path>    Directory for daily log files (default {})",
        DEFAULT_LOG_DIR,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut seed: Option<u64> = None;
    let mut config: Option<PathBuf> = None;
    let mut log_dir: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--seed requires a numeric argument"))?;
                if seed.is_some() {
                    return Err(eyre!("--seed may only be specified once"));
                }
                seed = Some(
                    raw.parse()
                        .wrap_err_with(|| format!("invalid --seed value '{raw}'"))?,
                );
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--config requires a path argument"))?;
                if config.is_some() {
                    return Err(eyre!("--config may only be specified once"));
                }
                config = Some(resolve_path(&path));
            }
            "--log-dir" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(resolve_path(&path));
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    Ok(CliArgs {
        seed,
        config,
        log_dir: log_dir.unwrap_or_else(|| resolve_path(DEFAULT_LOG_DIR)),
    })
}

// The terminal belongs to the UI, so logs go to a daily file.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, "crash-gifts.log"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = parse_cli_args()?;
    let _guard = init_tracing(&cli.log_dir)?;

    let game = match &cli.config {
        Some(path) => GameConfig::load(path)
            .wrap_err_with(|| format!("loading config {}", path.display()))?,
        None => GameConfig::default(),
    };
    tracing::info!(seed = ?cli.seed, config = ?cli.config, "starting crash-gifts");
    client::run_app(client::AppConfig {
        game,
        seed: cli.seed,
        frame: FRAME,
    })
    .await
}
