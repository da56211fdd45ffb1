// src/bin/gpu_monitor.rs

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gpu_monitor::config::{find_config_file, Overrides, CONFIG};
use gpu_monitor::native::NativeMonitor;
use gpu_monitor::privilege::root_check;
use gpu_monitor::session::run_session;
use gpu_monitor::shutdown::block_termination_signals;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gpu-monitor")]
#[command(about = "Print GPU core, junction and VRAM temperatures every second", long_about = None)]
struct Args {
    /// Use config file at defined path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Shared library to load instead of libgpumonitor.so
    #[arg(long, value_name = "PATH")]
    library: Option<PathBuf>,

    /// Seconds between polling rounds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Print one JSON object per device per round
    #[arg(long)]
    json: bool,

    /// Sample every device once and exit
    #[arg(long)]
    once: bool,

    /// Show debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("ERROR:\n");
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    // Blocked before any thread exists or the library is opened, so an
    // interrupt can never skip the native cleanup. Also held in --once mode.
    let mask = block_termination_signals()?;

    root_check()?;

    let config_path = find_config_file(args.config.as_deref())?;
    CONFIG.set_path(config_path)?;
    if CONFIG.has_config() {
        tracing::info!("Using settings defined in {} file", CONFIG.get_path().display());
    }

    let overrides = Overrides {
        interval_secs: args.interval,
        library: args.library,
        json: args.json,
    };
    let settings = CONFIG.settings()?.with_overrides(&overrides)?;

    let source = NativeMonitor::open(&settings.library)?;
    let rounds = run_session(source, io::stdout(), &settings, args.once, &mask)?;
    tracing::debug!("{} polling round(s) completed", rounds);
    Ok(())
}
