//! qlens - correlate MoQ and QUIC traces across endpoints
//!
//! Loads one trace per endpoint, pairs endpoints into connections and prints the matched
//! messages with their diagram rows and nesting slots.

use anyhow::bail;
use chrono::{DateTime, Duration, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use qlens_core::config::{ConfigLoader, ConfigResult, QlensConfig};
use qlens_core::loader::load_trace_files;
use qlens_core::trace_file::Epoch;
use qlens_core::{ParseOptions, TraceFile};
use qlens_correlate::{
    ConnectionGraph, ConnectionSelection, Network, NetworkReport, ProtocolFilter,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "qlens")]
#[command(version)]
#[command(about = "Correlate MoQ and QUIC traces across endpoints", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "QLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file details and rejected events
    Inspect {
        /// Trace files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Reconstruct connections across all files
    Network {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Reconstruct only the given connections
    Select {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Connection id to include (repeatable)
        #[arg(short = 'i', long = "connection", required = true)]
        connections: Vec<String>,

        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(clap::Args)]
struct ViewArgs {
    /// Hide QUIC events
    #[arg(long)]
    no_transport: bool,

    /// Hide MoQ events
    #[arg(long)]
    no_application: bool,
}

impl ViewArgs {
    /// CLI flags can only hide what the config shows
    fn filter(&self, config: &QlensConfig) -> ProtocolFilter {
        let base = ProtocolFilter::from(&config.view);
        ProtocolFilter {
            show_transport: base.show_transport && !self.no_transport,
            show_application: base.show_application && !self.no_application,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = ConfigLoader::new().with_cli_path(cli.config.clone()).load();
    let (config, config_warning) = config_or_default(loaded);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose, &config))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match config_warning {
        Some(warning) => warn!("{}", warning),
        None => info!("Configuration loaded successfully"),
    }

    let options = config.import.parse_options();

    match cli.command {
        Commands::Inspect { files } => {
            let traces = load_files(&files, &options).await?;
            inspect_command(&traces, cli.format)
        }
        Commands::Network { files, view } => {
            let traces = load_files(&files, &options).await?;
            let refs: Vec<&TraceFile> = traces.iter().collect();
            let network = Network::build(&refs, view.filter(&config));
            print_report(&NetworkReport::from_network(&network), &network, cli.format)
        }
        Commands::Select {
            files,
            connections,
            view,
        } => {
            let traces = load_files(&files, &options).await?;
            let refs: Vec<&TraceFile> = traces.iter().collect();
            let filter = view.filter(&config);
            let network = Network::build(&refs, filter);

            let mut selection = ConnectionSelection::new();
            for id in &connections {
                if selection.select_id(&network, id) == 0 {
                    warn!("No connection with id {}", id);
                }
            }
            if selection.is_empty() {
                bail!("None of the requested connections exist");
            }

            let selected = selection.build(&network, filter);
            print_report(&NetworkReport::from_graph(&selected), &selected, cli.format)
        }
    }
}

/// Fall back to defaults on a bad config. The warning is returned so it can be
/// logged once the subscriber is installed.
fn config_or_default(loaded: ConfigResult<QlensConfig>) -> (QlensConfig, Option<String>) {
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (
            QlensConfig::default(),
            Some(format!("Failed to load configuration: {}, using defaults", e)),
        ),
    }
}

/// CLI verbose flag takes precedence, then config
fn log_level(verbose: u8, config: &QlensConfig) -> Level {
    match verbose {
        0 => match config.general.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

async fn load_files(
    paths: &[PathBuf],
    options: &ParseOptions,
) -> anyhow::Result<Vec<TraceFile>> {
    // Failures are already logged by the loader
    let traces: Vec<TraceFile> = load_trace_files(paths, options)
        .await
        .into_iter()
        .filter_map(|(_, result)| result.ok())
        .collect();

    if traces.is_empty() {
        bail!("No trace file could be loaded");
    }
    Ok(traces)
}

#[derive(Serialize)]
struct FileReport<'a> {
    name: &'a str,
    schema: &'a str,
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_event: Option<String>,
    rejected: &'a [qlens_core::RejectedEvent],
}

fn inspect_command(traces: &[TraceFile], format: OutputFormat) -> anyhow::Result<()> {
    let reports: Vec<FileReport> = traces
        .iter()
        .map(|trace| FileReport {
            name: &trace.name,
            schema: trace.schema(),
            role: trace.role().as_str(),
            title: trace.title(),
            events: trace.events.len(),
            first_event: first_event_time(trace).map(|t| t.to_rfc3339()),
            rejected: &trace.rejected,
        })
        .collect();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        println!();
        println!("{}", report.name);
        println!("  Schema:   {}", report.schema);
        println!("  Role:     {}", report.role);
        if let Some(title) = report.title {
            println!("  Title:    {}", title);
        }
        println!("  Events:   {}", report.events);
        if let Some(first) = &report.first_event {
            println!("  Starts:   {}", first);
        }
        if !report.rejected.is_empty() {
            println!("  Rejected: {}", report.rejected.len());
            for rejected in report.rejected {
                println!(
                    "    #{} {}: {}",
                    rejected.record,
                    rejected.name.as_deref().unwrap_or("<unnamed>"),
                    rejected.reason
                );
            }
        }
    }
    println!();

    Ok(())
}

/// Wall-clock time of the first event, when the trace declares its epoch (times in ms)
fn first_event_time(trace: &TraceFile) -> Option<DateTime<FixedOffset>> {
    let reference = trace.details.common_fields()?.reference_time.as_ref()?;
    let Epoch::At(epoch) = &reference.epoch else {
        return None;
    };
    let first = trace.events.first()?;
    epoch.checked_add_signed(Duration::try_milliseconds(first.time)?)
}

fn print_report<G: ConnectionGraph>(
    report: &NetworkReport,
    graph: &G,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!("Nodes: {}", graph.nodes().join(", "));
    println!("Rows: {}", report.max_event_num);
    if let Some(start) = report.start_time {
        println!("Start time: {}", start);
    }
    println!("Transport events: {}", report.contains_transport_events);

    for connection in &report.connections {
        println!();
        println!(
            "Connection {}: {} -> {}",
            connection.key.connection_id,
            connection.key.starting_file,
            connection.key.accepting_file
        );
        println!(
            "  {} messages, {} half messages, {} other events, nesting depth {}",
            connection.messages.len(),
            connection.half_messages.len(),
            connection.standalone_events,
            connection.max_nesting_depth
        );

        for message in &connection.messages {
            let slot = message
                .nesting_slot
                .map(|s| format!(" [slot {}]", s))
                .unwrap_or_default();
            println!(
                "  {:>5} -> {:<5} {} ({}ms){}",
                message.created_event_num,
                message.parsed_event_num,
                message.name,
                message.latency,
                slot
            );
        }
        for half in &connection.half_messages {
            println!(
                "  {:>5}  ?    {} in {} (no counterpart in {})",
                half.event_num, half.name, half.file, half.expected_file
            );
        }
    }

    if let Some(ungrouped) = report.ungrouped_events {
        if ungrouped > 0 {
            println!();
            println!("Events without connection id: {}", ungrouped);
        }
    }
    if !report.unpaired_endpoints.is_empty() {
        println!();
        println!("Endpoints without counterpart:");
        for endpoint in &report.unpaired_endpoints {
            println!(
                "  {} in {} ({} events)",
                endpoint.connection_id, endpoint.file, endpoint.events
            );
        }
    }
    println!();

    Ok(())
}
