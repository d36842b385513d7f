//! poolwatch command-line interface: one-shot checks, the monitoring daemon,
//! and service management tooling.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use poolwatch_core::format::{
    exit_code_for_severity, format_check_result_json, format_check_result_text,
};
use poolwatch_core::{logging, PoolMonitor, PoolwatchConfig, ZfsParser};
use poolwatch_zfs::{SystemZfsClient, DEFAULT_ZPOOL_PATHS};
use schemars::schema_for;
use std::path::PathBuf;

mod daemon_loop;
mod service;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "poolwatch",
    version,
    about = "ZFS pool monitoring and e-mail alerting for a single host."
)]
struct Cli {
    /// Path to the poolwatch configuration file.
    #[arg(short, long, default_value = "/etc/poolwatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one check pass, print a report, and exit 0/1/2 by severity.
    Check {
        /// Output format for the report.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Restrict the check to a single pool.
        #[arg(long)]
        pool: Option<String>,
    },

    /// Run the continuous monitoring daemon.
    Daemon {
        /// Stay attached to the terminal and log in plain format.
        #[arg(long)]
        foreground: bool,
    },

    /// Show tool, configuration, and environment information.
    Info,

    /// Validate a configuration file or emit the config schema.
    Validate {
        /// Configuration file to validate; defaults to --config.
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// Output the JSON schema instead of validating a file.
        #[arg(long)]
        schema: bool,
    },

    /// Manage the systemd service unit for the daemon.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServiceAction {
    /// Write the unit file and enable the service.
    Install,
    /// Stop the service and remove the unit file.
    Uninstall,
    /// Show the service status via systemctl.
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Dispatch to the requested subcommand and map results into exit codes.
fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check { format, pool } => {
            logging::init_terminal();
            let config = PoolwatchConfig::load_or_default(&cli.config)?;
            cmd_check(&config, format, pool.as_deref())
        }
        Commands::Daemon { foreground } => {
            let config = PoolwatchConfig::load(&cli.config)
                .with_context(|| format!("load config {}", cli.config.display()))?;
            logging::init_daemon(&config.log, foreground);
            daemon_loop::run(config)?;
            Ok(0)
        }
        Commands::Info => {
            logging::init_terminal();
            let config = PoolwatchConfig::load_or_default(&cli.config)?;
            cmd_info(&cli.config, &config)
        }
        Commands::Validate { file, schema } => {
            logging::init_terminal();
            cmd_validate(file.unwrap_or(cli.config), schema)
        }
        Commands::Service { action } => {
            logging::init_terminal();
            match action {
                ServiceAction::Install => {
                    service::install(&cli.config)?;
                    Ok(0)
                }
                ServiceAction::Uninstall => {
                    service::uninstall()?;
                    Ok(0)
                }
                ServiceAction::Status => service::status(),
            }
        }
    }
}

/// One linear pass: acquire, parse and merge, classify, report.
fn cmd_check(
    config: &PoolwatchConfig,
    format: OutputFormat,
    pool: Option<&str>,
) -> Result<i32> {
    let client = SystemZfsClient::from_config(config)?;
    let parser = ZfsParser::new();

    let list_data = client.get_pool_list(pool, None, None)?;
    let status_data = client.get_pool_status(pool, None)?;

    let pools_from_list = parser.parse_pool_list(&list_data)?;
    let pools_from_status = parser.parse_pool_status(&status_data)?;
    let pools = parser.merge_pool_data(pools_from_list, pools_from_status);

    let monitor = PoolMonitor::new(config.monitor.clone());
    let result = monitor.check_all_pools(&pools);

    match format {
        OutputFormat::Text => println!("{}", format_check_result_text(&result)),
        OutputFormat::Json => println!("{}", format_check_result_json(&result)),
    }

    Ok(exit_code_for_severity(result.overall_severity))
}

fn cmd_info(config_path: &PathBuf, config: &PoolwatchConfig) -> Result<i32> {
    println!("poolwatch v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Config file: {} ({})",
        config_path.display(),
        if config_path.exists() {
            "present"
        } else {
            "absent, using defaults"
        }
    );

    match SystemZfsClient::from_config(config) {
        Ok(client) => println!("zpool binary: {}", client.zpool_path().display()),
        Err(err) => {
            println!("zpool binary: unavailable ({err})");
            println!(
                "Probed locations: PATH, {}",
                DEFAULT_ZPOOL_PATHS.join(", ")
            );
        }
    }

    println!("State file: {}", config.state_file_path().display());
    println!("Check interval: {}s", config.daemon.check_interval_seconds);
    if config.daemon.pools_to_monitor.is_empty() {
        println!("Monitored pools: all");
    } else {
        println!(
            "Monitored pools: {}",
            config.daemon.pools_to_monitor.join(", ")
        );
    }
    if config.alert.recipients.is_empty() {
        println!("Alert recipients: none configured");
    } else {
        println!("Alert recipients: {}", config.alert.recipients.join(", "));
    }
    Ok(0)
}

fn cmd_validate(file: PathBuf, schema: bool) -> Result<i32> {
    if schema {
        let schema = schema_for!(PoolwatchConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(0);
    }

    let config = PoolwatchConfig::load(&file)
        .with_context(|| format!("validate config {}", file.display()))?;

    let warnings = config.lint();
    if warnings.is_empty() {
        println!("Configuration OK: {}", file.display());
    } else {
        println!("Configuration loads, with warnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    Ok(0)
}
