use anyhow::Result;
use clap::{Parser, ValueEnum};
use conductor::{ConductorConfig, Manager, Worker};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "conductor", version)]
#[command(about = "Run a group of workers under one cancellation signal and one exit code")]
#[command(long_about = "Starts the configured workers under a component manager, either all at once \
or one after another, and shuts them down within a grace period when SIGINT or SIGTERM \
arrives or when any worker fails. Exits 0 only if every worker stopped cleanly.")]
struct Args {
    /// TOML file with the [manager] section and [[workers]] entries
    #[arg(short, long, default_value = "conductor.toml")]
    config: String,

    /// Log manager and worker lifecycle at debug level, including ticks
    #[arg(short, long, conflicts_with_all = ["verbose", "quiet"])]
    debug: bool,

    /// Log start, stop and shutdown progress
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Log only failures and grace period overruns
    #[arg(short, long)]
    quiet: bool,

    /// Check the configuration and exit without starting any worker
    #[arg(long)]
    validate_config: bool,

    /// Print a sample configuration with two workers and exit
    #[arg(long)]
    print_config: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl Args {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Needs neither logging nor a config file.
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting conductor v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ConductorConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let manager = Manager::from_config(&config.manager);
    for worker in &config.workers {
        manager.add(Worker::new(worker.clone()))?;
    }
    if manager.is_empty() {
        warn!("No workers configured; waiting for a shutdown signal");
    }

    let ctx = CancellationToken::new();
    spawn_signal_handler(ctx.clone());

    let exit_code = match manager.run(ctx).await {
        Ok(()) => {
            info!("All components stopped cleanly");
            0
        }
        Err(e) => {
            error!("Components stopped with error [{}]: {}", e.as_label(), e);
            1
        }
    };

    info!("Conductor exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

/// Cancel `ctx` on the first SIGINT or SIGTERM.
fn spawn_signal_handler(ctx: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => info!("Received {} signal", signal),
            Err(e) => error!("Failed to listen for shutdown signals: {}", e),
        }
        ctx.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl+C")
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // RUST_LOG wins over the verbosity flags.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("conductor={}", args.log_level())));

    // Worker names are in the messages; source locations only help when debugging.
    let fmt_layer = match args.log_format {
        LogFormat::Json => fmt::layer().json().with_current_span(false).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let mut config = ConductorConfig::default();
    let mut database = conductor::WorkerConfig::new("database");
    database.startup_delay_ms = 500;
    let mut server = conductor::WorkerConfig::new("server");
    server.shutdown_delay_ms = 250;
    config.workers = vec![database, server];

    println!("# Conductor Configuration File");
    println!("# strategy: \"concurrent\" or \"ordered\"; shutdown_timeout_seconds = 0 waits forever");
    println!();
    println!("{}", config.to_toml()?);
    Ok(())
}
