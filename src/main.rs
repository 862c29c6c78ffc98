//! League Harvest main entry point
//!
//! This is the command-line interface for the league-table harvester.

use clap::Parser;
use league_harvest::config::{load_config_with_hash, Config};
use league_harvest::harvest::run_harvest;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// League Harvest: a polite league-table harvester
///
/// League Harvest walks a source's seasons and divisions, scrapes each
/// division's standings at a throttled pace, and reconciles them into a local
/// SQLite database without ever duplicating a team row.
#[derive(Parser, Debug)]
#[command(name = "league-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite league-table harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without contacting the source
    #[arg(long, conflicts_with_all = ["stats", "find_team", "resolve_identities", "link"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "find_team", "resolve_identities", "link"])]
    stats: bool,

    /// List every stored row for a team name and exit
    #[arg(long, value_name = "NAME", conflicts_with_all = ["dry_run", "stats", "resolve_identities", "link"])]
    find_team: Option<String>,

    /// Link unresolved rows to identities where a recurrence is exact, then exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "find_team", "link"])]
    resolve_identities: bool,

    /// Link a stored team row to a named identity, creating it if needed, then exit
    #[arg(
        long,
        num_args = 2,
        value_names = ["TEAM_ID", "IDENTITY_NAME"],
        conflicts_with_all = ["dry_run", "stats", "find_team", "resolve_identities"]
    )]
    link: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(name) = &cli.find_team {
        handle_find_team(&config, name)?;
    } else if cli.resolve_identities {
        handle_resolve_identities(&config)?;
    } else if let Some(args) = &cli.link {
        handle_link(&config, args)?;
    } else {
        handle_harvest(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("league_harvest=info,warn"),
            1 => EnvFilter::new("league_harvest=debug,info"),
            2 => EnvFilter::new("league_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(
    config: &Config,
) -> Result<league_harvest::storage::SqliteStorage, Box<dyn std::error::Error>> {
    Ok(league_harvest::storage::open_storage(Path::new(
        &config.output.database_path,
    ))?)
}

/// Handles the --dry-run mode: validates config and shows the plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== League Harvest Dry Run ===\n");

    println!("Source:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  League: {}", config.source.league_id);
    println!("  User: {}", config.source.username);
    println!(
        "  Secret: {}",
        match (&config.source.password, &config.source.password_env) {
            (Some(_), _) => "inline".to_string(),
            (None, Some(var)) => format!("from ${}", var),
            (None, None) => "missing".to_string(),
        }
    );
    println!("  Login: {}", config.source.login_path);
    println!("  Seasons: {}", config.source.seasons_path);
    println!("  Divisions: {}/<season>", config.source.divisions_path);
    println!("  Scrape: {}", config.source.scrape_path);
    println!("  Timeout: {}s", config.source.request_timeout_secs);

    println!("\nScheduler:");
    println!(
        "  Delay between scrapes: {}ms + up to {}ms jitter",
        config.scheduler.base_delay_ms, config.scheduler.jitter_ms
    );
    println!("  Attempts per division: {}", config.scheduler.max_attempts);

    println!("\nUser Agent:");
    println!(
        "  {}",
        league_harvest::source::user_agent_string(&config.user_agent)
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    match &config.output.summary_path {
        Some(path) => println!("  Summary: {}", path),
        None => println!("  Summary: (console only)"),
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would log in, list seasons and scrape every division of league {}", config.source.league_id);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use league_harvest::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --find-team mode: lists every row stored under a team name
fn handle_find_team(config: &Config, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    use league_harvest::storage::{KeyPrefix, ReconciliationStore};

    let storage = open_storage(config)?;
    let rows = storage.find_teams_by_natural_key_prefix(&KeyPrefix::team(name))?;

    if rows.is_empty() {
        println!("No stored rows for '{}'", name);
        return Ok(());
    }

    println!("Rows for '{}' ({}):", name, rows.len());
    for row in rows {
        let identity = match storage.identity_for(row.id)? {
            Some(identity) => format!("{} (#{})", identity.canonical_name, identity.id),
            None => "unresolved".to_string(),
        };
        println!(
            "  #{} season {} / {} / league {} (division id {}) active={} identity: {}",
            row.id,
            row.key.season_id,
            row.key.division_label,
            row.key.league_id,
            row.division_id,
            row.is_active,
            identity
        );
    }

    Ok(())
}

/// Handles the --resolve-identities mode: links exact recurrences
fn handle_resolve_identities(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use league_harvest::identity::IdentityResolver;

    let mut storage = open_storage(config)?;
    let report = IdentityResolver::new(&mut storage).resolve_all()?;

    println!("Examined {} unresolved rows", report.examined);
    println!("  Linked: {}", report.linked);
    println!("  Still unresolved: {}", report.unresolved);
    if !report.ambiguous.is_empty() {
        println!("  Ambiguous ({}):", report.ambiguous.len());
        for (team_id, identities) in &report.ambiguous {
            println!("    row #{} matches identities {:?}", team_id, identities);
        }
    }

    Ok(())
}

/// Handles the --link mode: operator-confirmed identity link
fn handle_link(config: &Config, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    use league_harvest::identity::IdentityResolver;

    let [team_id, identity_name] = args else {
        return Err("--link takes TEAM_ID and IDENTITY_NAME".into());
    };
    let team_id: i64 = team_id
        .parse()
        .map_err(|_| format!("invalid team id: {}", team_id))?;

    let mut storage = open_storage(config)?;
    let identity = IdentityResolver::new(&mut storage).link_manually(team_id, identity_name)?;

    println!(
        "✓ Row #{} linked to '{}' (identity #{})",
        team_id, identity.canonical_name, identity.id
    );

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    use league_harvest::output::print_run_summary;

    tracing::info!(
        "Harvesting league {} from {}",
        config.source.league_id,
        config.source.base_url
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current division");
            on_interrupt.cancel();
        }
    });

    let summary = match run_harvest(config, config_hash, &cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    print_run_summary(&summary);

    if summary.is_aborted() {
        let reason = summary
            .abort_reason
            .unwrap_or_else(|| "unknown reason".to_string());
        return Err(format!("run aborted: {}", reason).into());
    }

    Ok(())
}
