//! Ledgerscope CLI
//!
//! Queries the explorer API and prints JSON to stdout. Logs go to stderr.
//!
//! # CLI Commands
//!
//! - `page <entity>` - Fetch one page of a collection
//! - `transfers` - Fetch token transfers enriched with their pools
//! - `histogram <entity>` - Fetch bucketed counts for a collection
//! - `check-config` - Validate configuration file
//!
//! # Filters
//!
//! `--filter FIELD:OP:VALUE`, where `OP` is an operator name (`eq`, `gt`,
//! `gte`, `lt`, `lte`, `contains`, `startsWith`, `endsWith`). Prefix the
//! operator with `!` to negate it and suffix it with `/i` to ignore case,
//! e.g. `--filter 'topic:!contains/i:payment'`.
//!
//! # Configuration
//!
//! The CLI reads configuration from:
//! 1. `--config` argument
//! 2. `LEDGERSCOPE_CONFIG` environment variable (path to TOML file)
//! 3. `./ledgerscope.toml` in current directory
//! 4. Default configuration
//!
//! Environment overrides (`LEDGERSCOPE_API_URL`, `LEDGERSCOPE_NAMESPACE`,
//! `LEDGERSCOPE_PAGE_SIZE`) apply in every case.

use clap::{Args, Parser, Subcommand};
use ledgerscope::{
    config::Config,
    histogram::{totals, CategoryMap},
    models::TokenTransfer,
    query::{CancellationToken, HistogramRequest, PageQuery},
    DateRange, EntityKind, FilterDraft, Operator, Session,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEFAULT_CONFIG_FILE: &str = "ledgerscope.toml";

#[derive(Parser)]
#[command(name = "ledgerscope")]
#[command(version)]
#[command(about = "Query a multiparty ledger explorer API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (overrides LEDGERSCOPE_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override namespace
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one page of a collection
    Page {
        /// Collection path, e.g. `events` or `tokens/pools`
        entity: String,

        #[command(flatten)]
        paging: PagingArgs,
    },

    /// Fetch token transfers enriched with their pools
    Transfers {
        #[command(flatten)]
        paging: PagingArgs,
    },

    /// Fetch bucketed counts for a collection
    Histogram {
        /// Collection path, e.g. `tokens/transfers`
        entity: String,

        /// Look-back window: 1hour, 24hours, 7days or 30days
        #[arg(short, long, default_value = "24hours")]
        range: String,

        /// Number of buckets (defaults to session.histogram_buckets)
        #[arg(short, long)]
        buckets: Option<usize>,

        /// JSON file mapping raw types to {category, color, nicename}
        #[arg(long)]
        categories: PathBuf,
    },

    /// Validate configuration file
    CheckConfig,
}

#[derive(Args)]
struct PagingArgs {
    /// Filter as FIELD:OP:VALUE (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// Look-back window: 1hour, 24hours, 7days or 30days
    #[arg(short, long)]
    range: Option<String>,

    /// Zero-based page number
    #[arg(short, long, default_value_t = 0)]
    page: usize,

    /// Rows per page (defaults to session.default_page_size)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Print the request instead of sending it
    #[arg(long)]
    dry_run: bool,
}

// =============================================================================
// Argument parsing
// =============================================================================

fn parse_entity(path: &str) -> CliResult<EntityKind> {
    EntityKind::from_path(path).ok_or_else(|| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.path()).collect();
        format!("unknown collection '{}' (expected one of {})", path, known.join(", ")).into()
    })
}

fn parse_range(name: &str) -> CliResult<DateRange> {
    DateRange::from_name(name).ok_or_else(|| {
        format!("unknown range '{name}' (expected 1hour, 24hours, 7days or 30days)").into()
    })
}

fn parse_filter(kind: EntityKind, spec: &str) -> CliResult<FilterDraft> {
    let mut parts = spec.splitn(3, ':');
    let (Some(field), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("filter '{spec}' is not FIELD:OP:VALUE").into());
    };

    if !kind.allows_field(field) {
        return Err(format!(
            "field '{}' cannot be filtered on {} (allowed: {})",
            field,
            kind,
            kind.filter_fields().join(", ")
        )
        .into());
    }

    let (negate, op) = match op.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, op),
    };
    let (case_insensitive, op) = match op.strip_suffix("/i") {
        Some(rest) => (true, rest),
        None => (false, op),
    };
    let operator = Operator::from_name(op).ok_or_else(|| format!("unknown operator '{op}'"))?;

    Ok(FilterDraft::new(field, operator, value)
        .negated(negate)
        .case_insensitive(case_insensitive))
}

fn page_query(kind: EntityKind, args: &PagingArgs, config: &Config) -> CliResult<PageQuery> {
    let limit = args.limit.unwrap_or(config.session.default_page_size);
    let mut query = PageQuery::new(kind.path(), limit).page(args.page);
    for spec in &args.filters {
        query = query.filter(parse_filter(kind, spec)?);
    }
    if let Some(range) = &args.range {
        query = query.date_range(parse_range(range)?);
    }
    Ok(query)
}

// =============================================================================
// Configuration
// =============================================================================

fn load_config(cli: &Cli) -> CliResult<Config> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("LEDGERSCOPE_CONFIG").map(PathBuf::from))
        .or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.exists().then(|| default.to_path_buf())
        });

    let mut config = match path {
        Some(path) => Config::from_file_with_env(&path.to_string_lossy())?,
        None => Config::from_env(),
    };

    if let Some(namespace) = &cli.namespace {
        config.session.namespace = namespace.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

fn print_request(session: &Session, query: &PageQuery) -> CliResult<()> {
    let descriptor = session.orchestrator::<Value>().describe(query)?;
    print_json(&json!({
        "path": descriptor.path(),
        "query": descriptor.query(),
    }))
}

async fn cmd_page(config: &Config, entity: &str, paging: &PagingArgs) -> CliResult<()> {
    let kind = parse_entity(entity)?;
    let query = page_query(kind, paging, config)?;
    let session = Session::from_config(config)?;

    if paging.dry_run {
        return print_request(&session, &query);
    }

    let page = session
        .orchestrator::<Value>()
        .fetch_page::<Value>(&query, &CancellationToken::new())
        .await?;
    info!(entity = %kind, rows = page.len(), total = page.total, "Page fetched");
    print_json(&page)
}

async fn cmd_transfers(config: &Config, paging: &PagingArgs) -> CliResult<()> {
    let query = page_query(EntityKind::TokenTransfers, paging, config)?;
    let session = Session::from_config(config)?;

    if paging.dry_run {
        return print_request(&session, &query);
    }

    let page = session
        .pool_orchestrator()
        .fetch_page::<TokenTransfer>(&query, &CancellationToken::new())
        .await?;

    let stats = session.pools().stats();
    info!(
        rows = page.len(),
        total = page.total,
        pool_fetches = stats.misses,
        pool_failures = stats.failures,
        "Transfers fetched"
    );
    print_json(&page)
}

async fn cmd_histogram(
    config: &Config,
    entity: &str,
    range: &str,
    buckets: Option<usize>,
    categories: &Path,
) -> CliResult<()> {
    let kind = parse_entity(entity)?;
    let collection = kind
        .histogram_collection()
        .ok_or_else(|| format!("{kind} has no histogram"))?;
    let range = parse_range(range)?;

    let contents = std::fs::read_to_string(categories)
        .map_err(|e| format!("failed to read {}: {e}", categories.display()))?;
    let categories: CategoryMap = serde_json::from_str(&contents)?;
    debug!(types = categories.len(), "Loaded category map");

    let session = Session::from_config(config)?;
    let request = HistogramRequest::for_range(
        session.namespace(),
        collection,
        range,
        chrono::Utc::now(),
        buckets.unwrap_or(config.session.histogram_buckets),
    );
    let rows = session
        .orchestrator::<Value>()
        .fetch_histogram(&request, &categories)
        .await?;

    print_json(&json!({
        "legend": categories.legend(),
        "empty": ledgerscope::histogram::is_empty(&rows),
        "totals": totals(&rows),
        "buckets": rows,
    }))
}

fn cmd_check_config(config: &Config) -> CliResult<()> {
    println!("Configuration is valid!");
    println!();
    println!("API Settings:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Timeout: {} ms", config.api.timeout_ms);
    println!();
    println!("Session Settings:");
    println!("  Namespace: {}", config.session.namespace);
    println!("  Default page size: {}", config.session.default_page_size);
    println!("  Max page size: {}", config.session.max_page_size);
    println!("  Histogram buckets: {}", config.session.histogram_buckets);
    println!();
    println!("Cache:");
    match config.cache.max_entries {
        Some(max) => println!("  Max entries: {max}"),
        None => println!("  Max entries: unbounded"),
    }
    println!("  Log level: {}", config.logging.level);
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    debug!(
        base_url = %config.api.base_url,
        namespace = %config.session.namespace,
        "Configuration loaded"
    );

    match &cli.command {
        Commands::Page { entity, paging } => cmd_page(&config, entity, paging).await?,
        Commands::Transfers { paging } => cmd_transfers(&config, paging).await?,
        Commands::Histogram {
            entity,
            range,
            buckets,
            categories,
        } => cmd_histogram(&config, entity, range, *buckets, categories).await?,
        Commands::CheckConfig => cmd_check_config(&config)?,
    }

    if cli.metrics {
        eprintln!("{}", ledgerscope::metrics::gather_metrics()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_flags() {
        let draft = parse_filter(EntityKind::Events, "topic:!contains/i:pay:ment").unwrap();
        assert_eq!(draft.compile().as_str(), "topic=!:@pay:ment");

        let draft = parse_filter(EntityKind::Events, "sequence:gt:10").unwrap();
        assert_eq!(draft.compile().as_str(), "sequence=>>10");
    }

    #[test]
    fn test_parse_filter_rejects() {
        assert!(parse_filter(EntityKind::Events, "topic:contains").is_err());
        assert!(parse_filter(EntityKind::Events, "pool:eq:x").is_err());
        assert!(parse_filter(EntityKind::Events, "topic:like:x").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "ledgerscope",
            "--namespace",
            "ns1",
            "page",
            "tokens/pools",
            "--filter",
            "name:startsWith:Go",
            "--limit",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.namespace.as_deref(), Some("ns1"));
        assert!(matches!(cli.command, Commands::Page { .. }));
    }
}
