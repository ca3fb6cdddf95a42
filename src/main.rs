//! CLI entry point for `mailquery`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailquery::config::{self, Config};
use mailquery::error::QueryError;
use mailquery::search::rules::{self, Rule};
use mailquery::search::{QueryEngine, QueryResult};
use mailquery::store::memory::MemoryStore;
use mailquery::store::snapshot::load_snapshot;

#[derive(Parser)]
#[command(
    name = "mailquery",
    version,
    about = "Evaluate JMAP-style message queries against mailbox snapshots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $MAILQUERY_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query request (JSON file, or - for stdin) against a snapshot
    Query {
        snapshot: PathBuf,
        request: PathBuf,
        /// Principal to query as (defaults to the request accountId, then the snapshot owner)
        #[arg(short, long)]
        principal: Option<String>,
        /// Override the request limit
        #[arg(short, long)]
        limit: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Apply filtering rules to every message of a snapshot
    Rules {
        snapshot: PathBuf,
        rules: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        write: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Query {
            snapshot,
            request,
            principal,
            limit,
            json,
        } => cmd_query(&config, &snapshot, &request, principal.as_deref(), limit, json),
        Commands::Rules {
            snapshot,
            rules,
            json,
        } => cmd_rules(&snapshot, &rules, json),
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailquery.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_snapshot(path: &Path) -> anyhow::Result<MemoryStore> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    load_snapshot(path).with_context(|| format!("Failed to load snapshot {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Render a query error the way a protocol client sees it.
fn protocol_error(error: QueryError) -> anyhow::Error {
    anyhow::anyhow!("{}: {error}", error.kind())
}

fn cmd_query(
    config: &Config,
    snapshot: &Path,
    request: &Path,
    principal: Option<&str>,
    limit: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_snapshot(snapshot)?;
    let mut raw = read_json(request)?;
    if let (Some(limit), Some(object)) = (limit, raw.as_object_mut()) {
        object.insert("limit".to_string(), limit.into());
    }

    let engine = QueryEngine::new(&store, &store, &store, config.query.clone());
    let request = engine.parse_request(&raw).map_err(protocol_error)?;
    let principal = principal
        .or(request.account_id.as_deref())
        .unwrap_or(store.owner())
        .to_string();

    let pb = ProgressBar::new(store.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Evaluating [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let result = engine
        .execute_with_progress(&principal, &request, &|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
            true
        })
        .map_err(protocol_error);
    pb.finish_and_clear();
    let result = result?;
    tracing::info!(elapsed = ?start.elapsed(), total = result.total, "Query finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_query_table(&store, &result);
    }
    Ok(())
}

fn cmd_rules(snapshot: &Path, rules_path: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_snapshot(snapshot)?;
    let rules: Vec<Rule> = serde_json::from_value(read_json(rules_path)?)
        .with_context(|| format!("Invalid rules in {}", rules_path.display()))?;

    let routed: Vec<(&str, Vec<String>)> = store
        .messages()
        .map(|message| {
            let targets = rules::apply(&rules, message)
                .into_iter()
                .map(|m| m.to_string())
                .collect();
            (message.id.as_str(), targets)
        })
        .collect();

    if json {
        let object: serde_json::Map<String, serde_json::Value> = routed
            .into_iter()
            .map(|(id, targets)| (id.to_string(), targets.into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&object)?);
        return Ok(());
    }

    println!();
    println!("  {} rule(s), {} message(s)", rules.len(), routed.len());
    println!();
    for (id, targets) in routed.iter().filter(|(_, t)| !t.is_empty()) {
        println!("  {:<24} -> {}", id, targets.join(", "));
    }
    println!();
    Ok(())
}

fn cmd_config(config: &Config, write: bool) -> anyhow::Result<()> {
    if write {
        let path = config::save_config(config)?;
        println!("  Configuration written to {}", path.display());
    } else {
        print!("{}", toml::to_string_pretty(config)?);
        eprintln!("  Log file: {}", config::log_file_path(config).display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailquery", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print query results as a human-readable table.
fn print_query_table(store: &MemoryStore, result: &QueryResult) {
    use humansize::{format_size, BINARY};

    println!();
    println!(
        "  {} of {} result(s), sorted by {}",
        result.message_ids.len(),
        result.total,
        result.sort.join(", ")
    );
    println!();

    if result.message_ids.is_empty() {
        return;
    }

    println!(
        "  {:<4} {:<12} {:<17} {:<25} {:<40} {:>8}",
        "#", "Id", "Date", "From", "Subject", "Size"
    );
    println!("  {}", "-".repeat(111));

    for (i, id) in result.message_ids.iter().enumerate() {
        let Some(message) = store.message(id) else {
            continue;
        };
        let date = message.sent_at().format("%Y-%m-%d %H:%M").to_string();
        let from = message
            .addresses("from")
            .into_iter()
            .next()
            .map(|a| if a.name.is_empty() { a.email } else { a.name })
            .unwrap_or_default();
        let id_trunc: String = id.as_str().chars().take(11).collect();
        let from_trunc: String = from.chars().take(24).collect();
        let subj_trunc: String = message.subject().chars().take(39).collect();

        println!(
            "  {:<4} {:<12} {:<17} {:<25} {:<40} {:>8}",
            result.position as usize + i + 1,
            id_trunc,
            date,
            from_trunc,
            subj_trunc,
            format_size(message.size, BINARY)
        );
    }
    println!();
}
