//! Courier command line tool.
//!
//! Inspects and operates the on-disk telemetry queues:
//! - `status`: queue size, age and eligibility per feature
//! - `submit`: append records to a feature's queue
//! - `drain`: upload every eligible batch once
//! - `purge`: delete a feature's queued data
//! - `config`: print the effective configuration

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use courier_common::config::resolve::ConfigSource;
use courier_common::{ConfigPaths, ConfigResolver, CourierConfig, Feature};
use courier_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use courier_core::{ExitCode, Pipeline};
use courier_upload::TickOutcome;
use serde::Serialize;
use tracing::{debug, error};

/// Courier - persistent telemetry queue and uploader
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to a courier.toml configuration file
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory holding the queues (overrides the config file)
    #[arg(long, global = true, env = "COURIER_ROOT")]
    root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show queue status per feature
    Status(StatusArgs),
    /// Append records to a feature's queue
    Submit(SubmitArgs),
    /// Upload every eligible batch of a feature once
    Drain(DrainArgs),
    /// Delete every queued batch of a feature
    Purge(PurgeArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Only this feature (default: all)
    #[arg(long)]
    feature: Option<Feature>,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    feature: Feature,

    /// Records to append; read one per line from stdin when omitted
    records: Vec<String>,
}

#[derive(Args, Debug)]
struct DrainArgs {
    #[arg(long)]
    feature: Feature,

    /// Collector endpoint (overrides the config file)
    #[arg(long, env = "COURIER_ENDPOINT")]
    endpoint: Option<String>,

    /// Client token (overrides the config file)
    #[arg(long, env = "COURIER_CLIENT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Upper bound on upload attempts
    #[arg(long, default_value_t = 1000)]
    max_ticks: usize,

    /// Emit JSON instead of a summary line
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PurgeArgs {
    #[arg(long)]
    feature: Feature,
}

fn main() {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_env(
        cli.global.log_level,
        cli.global.log_format,
    ));

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!(code = e.code(), error = %e, "command failed");
            eprintln!("courier: {e}");
            ExitCode::from(&e)
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn load_config(global: &GlobalOpts) -> courier_common::Result<(CourierConfig, ConfigSource)> {
    let resolver = ConfigResolver::new(ConfigPaths {
        config_path: global.config.clone(),
    });
    let (mut config, source) = resolver.load()?;
    if let Some(root) = &global.root {
        config.root_dir = Some(root.clone());
    }
    debug!(
        resolution = %source.resolution,
        path = ?source.path,
        root = %config.root_dir().display(),
        "configuration loaded"
    );
    Ok((config, source))
}

fn run(cli: Cli) -> courier_common::Result<ExitCode> {
    let (mut config, source) = load_config(&cli.global)?;

    match cli.command {
        Commands::Status(args) => {
            let features = args.feature.map_or(Feature::ALL.to_vec(), |f| vec![f]);
            let pipeline = Pipeline::builder(config).features(&features).build()?;
            run_status(&pipeline, &features, args.json)
        }
        Commands::Submit(args) => {
            let pipeline = Pipeline::builder(config)
                .features(&[args.feature])
                .build()?;
            run_submit(&pipeline, args)
        }
        Commands::Drain(args) => {
            if let Some(endpoint) = args.endpoint.clone() {
                config.upload.endpoint = endpoint;
            }
            if let Some(token) = args.token.clone() {
                config.upload.client_token = Some(token);
            }
            let pipeline = Pipeline::builder(config)
                .features(&[args.feature])
                .build()?;
            run_drain(&pipeline, &args)
        }
        Commands::Purge(args) => {
            let pipeline = Pipeline::builder(config)
                .features(&[args.feature])
                .build()?;
            let deleted = pipeline.purge(args.feature)?;
            println!("purged {deleted} batch file(s) from {}", args.feature);
            Ok(ExitCode::Clean)
        }
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| courier_common::Error::Config(e.to_string()))?;
            match &source.path {
                Some(path) => println!("# source: {} ({})", path.display(), source.resolution),
                None => println!("# source: built-in defaults"),
            }
            println!("# root: {}", config.root_dir().display());
            print!("{rendered}");
            Ok(ExitCode::Clean)
        }
    }
}

fn run_status(
    pipeline: &Pipeline,
    features: &[Feature],
    json: bool,
) -> courier_common::Result<ExitCode> {
    let mut statuses = Vec::new();
    for feature in features {
        if let Some(status) = pipeline.status(*feature)? {
            statuses.push((feature.as_str(), status));
        }
    }

    if json {
        let mut map = serde_json::Map::new();
        for (name, status) in statuses {
            map.insert(name.to_string(), serde_json::to_value(status)?);
        }
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(ExitCode::Clean);
    }

    println!(
        "{:<8} {:>6} {:>12} {:>9} {:>8} {:>12}",
        "FEATURE", "FILES", "BYTES", "ELIGIBLE", "ORPHANS", "OLDEST"
    );
    for (name, status) in statuses {
        let oldest = status
            .oldest_file_age_ms
            .map_or_else(|| "-".to_string(), |ms| format!("{:.1}s", ms as f64 / 1000.0));
        println!(
            "{:<8} {:>6} {:>12} {:>9} {:>8} {:>12}",
            name,
            status.file_count,
            status.total_bytes,
            status.eligible_files,
            status.orphaned_files,
            oldest
        );
    }
    Ok(ExitCode::Clean)
}

fn run_submit(pipeline: &Pipeline, args: SubmitArgs) -> courier_common::Result<ExitCode> {
    let mut count = 0usize;
    if args.records.is_empty() {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            eprintln!("courier: no records given and stdin is a terminal");
            return Ok(ExitCode::ArgsError);
        }
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            pipeline.submit(args.feature, line.as_bytes());
            count += 1;
        }
    } else {
        for record in &args.records {
            pipeline.submit(args.feature, record.as_bytes());
            count += 1;
        }
    }
    println!("queued {count} record(s) for {}", args.feature);
    Ok(ExitCode::Clean)
}

#[derive(Debug, Default, Serialize)]
struct DrainSummary {
    feature: String,
    delivered: usize,
    rejected: usize,
    retrying: usize,
    suspended: bool,
}

fn run_drain(pipeline: &Pipeline, args: &DrainArgs) -> courier_common::Result<ExitCode> {
    let mut summary = DrainSummary {
        feature: args.feature.to_string(),
        ..DrainSummary::default()
    };
    for outcome in pipeline.flush(args.feature, args.max_ticks) {
        match outcome {
            TickOutcome::Delivered { .. } => summary.delivered += 1,
            TickOutcome::Rejected { .. } => summary.rejected += 1,
            TickOutcome::Retrying { .. } => summary.retrying += 1,
            TickOutcome::Suspended => summary.suspended = true,
            TickOutcome::Idle => {}
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}: delivered {}, rejected {}, retrying {}",
            summary.feature, summary.delivered, summary.rejected, summary.retrying
        );
    }

    if summary.retrying > 0 || summary.suspended {
        Ok(ExitCode::Pending)
    } else {
        Ok(ExitCode::Clean)
    }
}
