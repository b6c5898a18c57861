use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use logspan::{parse_bound, scan_file, Order, ReaderConfig, ScanConfig, TimeWindow, Timestamp, DEFAULT_LOG_FORMAT};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status after an interrupted scan (128 + SIGINT)
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "logspan")]
#[command(about = "Request statistics for a time window of a web server access log")]
#[command(version)]
struct Args {
    /// Access log file to scan
    path: PathBuf,

    /// Inclusive start, DD/MM/YYYY:HH:MM:SS[+HHMM] (UTC without offset)
    #[arg(long, value_parser = parse_bound)]
    from: Option<Timestamp>,

    /// Exclusive end, DD/MM/YYYY:HH:MM:SS[+HHMM] (UTC without offset)
    #[arg(long, value_parser = parse_bound)]
    to: Option<Timestamp>,

    /// Chronological order of the file: ascending or descending
    #[arg(long, default_value_t = Order::Descending)]
    order: Order,

    /// Line template the log was written with
    #[arg(long, env = "LOGSPAN_FORMAT", default_value = DEFAULT_LOG_FORMAT)]
    format: String,

    /// Read buffer size in bytes
    #[arg(long, default_value_t = ReaderConfig::default().buffer_size)]
    buffer_size: usize,

    /// Suppress the console progress indicator
    #[arg(long)]
    no_progress: bool,

    /// Write the full report as JSON to this path
    #[arg(long)]
    stats_out: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit structured JSON logs on stderr
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    // Prefer RUST_LOG env var, fall back to --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn progress_bar(hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {elapsed} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message("scanning");
    Ok(bar)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, cancelling scan");
        },
        _ = terminate => {
            warn!("Received SIGTERM, cancelling scan");
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    info!(?args, "Parsed CLI arguments");

    // WHY: fail before any scanning so a typo never looks like an empty window
    if !args.path.exists() {
        anyhow::bail!("Log file does not exist: {}", args.path.display());
    }
    if !args.path.is_file() {
        anyhow::bail!("Log path is not a regular file: {}", args.path.display());
    }
    logspan::LineMatcher::new(&args.format).context("Invalid --format")?;

    let config = ScanConfig {
        format: args.format.clone(),
        order: args.order,
        window: TimeWindow::new(args.from, args.to),
        reader: ReaderConfig { buffer_size: args.buffer_size },
        ..ScanConfig::default()
    };

    let progress = progress_bar(args.no_progress)?;
    let cancel = CancellationToken::new();

    let mut scan = {
        let path = args.path.clone();
        let cancel = cancel.clone();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || {
            scan_file(&path, &config, cancel, |requests| {
                progress.set_message(format!("{requests} requests"));
            })
        })
    };

    let joined = tokio::select! {
        joined = &mut scan => joined,
        _ = shutdown_signal() => {
            cancel.cancel();
            scan.await
        }
    };
    let report = joined
        .context("Scan task failed")?
        .with_context(|| format!("Failed to scan {}", args.path.display()))?;
    progress.finish_and_clear();

    if report.cancelled {
        eprintln!("Cancelled");
        std::process::exit(EXIT_CANCELLED);
    }

    println!("{}", report.summary);

    if let Some(stats_out) = &args.stats_out {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(stats_out, json)
            .await
            .with_context(|| format!("Failed to write stats to {}", stats_out.display()))?;
        info!("Wrote stats to {}", stats_out.display());
    }

    Ok(())
}
