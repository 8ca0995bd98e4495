//! nsdpc - Netgear switch discovery client
//!
//! Broadcasts NSDP read requests on a local link and prints what the
//! switches answer.

mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nsdp_core::{MacAddr, RecordType};
use nsdp_discovery::{discover_with, list_interfaces, SystemIdentity};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "nsdpc")]
#[command(about = "Discover and query Netgear switches over NSDP")]
#[command(version)]
struct Args {
    /// Network interface to send from
    #[arg(short, long, global = true)]
    interface: Option<String>,

    /// Address a single switch by MAC instead of broadcasting
    #[arg(short, long, global = true)]
    destination: Option<MacAddr>,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "nsdpc.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Reply collection time in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find switches and show their identity
    Scan,
    /// Read a single property (model, name, mac, ip, dhcp, firmware, ports, ...)
    Get { property: RecordType },
    /// List local interfaces and their hardware addresses
    Interfaces,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("nsdpc v{}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Scan => run_discovery(&args, None).await,
        Command::Get { property } => run_discovery(&args, Some(*property)).await,
        Command::Interfaces => show_interfaces(&args),
    }
}

async fn run_discovery(args: &Args, property: Option<RecordType>) -> Result<()> {
    let config = config::load_config(&args.config)?;

    let Some(interface) = args.interface.clone().or_else(|| config.interface.clone()) else {
        bail!("no interface given; pass --interface or set `interface` in the config file");
    };

    let mut options = config.to_discovery_options(&interface, args.destination);
    if let Some(timeout) = args.timeout {
        options.timeout = Duration::from_millis(timeout);
    }
    if let Some(property) = property {
        options.records = vec![property];
    }

    let replies = discover_with(&SystemIdentity, &options)
        .await
        .with_context(|| format!("discovery on {} failed", interface))?;

    if args.json {
        println!("{}", output::render_json(&replies)?);
    } else {
        print!("{}", output::render_text(&replies));
    }
    Ok(())
}

fn show_interfaces(args: &Args) -> Result<()> {
    let interfaces = list_interfaces().context("failed to list interfaces")?;

    if args.json {
        let entries: Vec<serde_json::Value> = interfaces
            .iter()
            .map(|(name, mac)| {
                serde_json::json!({
                    "name": name,
                    "mac": mac.map(|m| m.to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (name, mac) in &interfaces {
            match mac {
                Some(mac) => println!("{:<16}{}", name, mac),
                None => println!("{:<16}-", name),
            }
        }
    }
    Ok(())
}
