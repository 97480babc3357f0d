use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::Parser;
use gemm_opt::{
    cancel::{self, CancelToken},
    config::{self, Config},
    device::Device,
    report::LogReporter,
};
use tracing_subscriber::EnvFilter;

/// Exit status of a sweep stopped by an interrupt.
const INTERRUPTED: u8 = 130;

/// Benchmark a GEMM backend against the reference kernel across a sweep of problem sizes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Options as KEY=VALUE pairs, e.g. `M=1024 step=2 verify=1 gemm=1`.
    #[arg(value_parser = config::parse_pair)]
    options: Vec<(String, String)>,

    /// Also append report lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Don't print report lines to standard output.
    #[arg(long)]
    no_console: bool,

    /// Print the available devices and exit.
    #[arg(long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = Cli::parse_from(&args);
    match run(cli, &args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, args: &[String]) -> anyhow::Result<ExitCode> {
    let config = Config::from_pairs(cli.options).context("failed to read options")?;

    if cli.list_devices {
        let device = Device::open(config.work_group_size).context("failed to open the device")?;
        println!("0: {}", device.info());
        return Ok(ExitCode::SUCCESS);
    }

    let mut reporter = LogReporter::new();
    if !cli.no_console {
        reporter = reporter.with_console();
    }
    if let Some(path) = &cli.log_file {
        reporter = reporter
            .with_file(path, args)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
    }

    let token = CancelToken::new();
    cancel::install_interrupt_handler(token.clone())
        .context("failed to install the interrupt handler")?;

    let summary = gemm_opt::run(config, &token, &mut reporter).context("benchmark aborted")?;
    if summary.cancelled {
        return Ok(ExitCode::from(INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}
