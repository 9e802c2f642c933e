//! unsmurf - puppet-aware card trade tallies
//!
//! A CLI tool that resolves puppet nations to their masters through
//! community alias tables and ranks the trade partners of a nation by
//! owning identity.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, network, unreadable input, etc.)

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use unsmurf::cli::{Args, Command, ListArgs, OutputFormat, SettingsArgs, TallyArgs};
use unsmurf::config::{Config, CONFIG_FILE};
use unsmurf::identity::{canonicalize, normalize_name};
use unsmurf::index::{AliasIndex, CacheManager, CardNames, RefreshOutcome};
use unsmurf::models::{ListingMetadata, ReportMetadata, Role, TallyMode, TradeRecord};
use unsmurf::report::{self, ReportOptions};
use unsmurf::settings::{SettingsStore, SETTINGS_FILE};
use unsmurf::source::{self, SourceLoader};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("unsmurf v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .unsmurf.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to add alias tables, a membership list, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so reports printed to stdout stay clean. `RUST_LOG`
/// overrides the level picked from `--verbose`/`--quiet`.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
    let settings = SettingsStore::open(settings_path);

    match args.command {
        Command::Tally(ref tally) => handle_tally(&config, &settings, tally, args.quiet).await,
        Command::Trades(ref list) => handle_trades(&config, &settings, list, args.quiet).await,
        Command::Puppets { ref master } => {
            handle_puppets(&config, &settings, master, args.quiet).await
        }
        Command::Resolve { ref names } => {
            handle_resolve(&config, &settings, names, args.quiet).await
        }
        Command::Normalize { ref labels } => {
            handle_normalize(labels);
            Ok(())
        }
        Command::Collect {
            ref output,
            ref members,
        } => handle_collect(&config, output, members, args.quiet).await,
        Command::Settings(ref change) => handle_settings(&config, &settings, change),
        Command::InitConfig => handle_init_config(),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn spinner(message: &str, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Build a cache and run its first load.
///
/// A failed load is reported but not fatal: lookups then fall back to
/// identity resolution and an empty membership list.
async fn load_cache(
    config: &Config,
    settings: &SettingsStore,
    loader: &SourceLoader,
    quiet: bool,
) -> Result<CacheManager> {
    let cache = CacheManager::new(settings.cache_window(config.engine.cache_window()));

    let pb = spinner("Loading alias tables and membership list...", quiet)?;
    let outcome = cache
        .ensure_fresh(|| loader.load_sources(&config.sources))
        .await;
    pb.finish_and_clear();

    match outcome {
        RefreshOutcome::Rebuilt {
            puppets,
            masters,
            members,
        } => {
            if !quiet {
                eprintln!(
                    "📥 Loaded {} puppets of {} masters, {} current nations",
                    puppets, masters, members
                );
            }
        }
        RefreshOutcome::Fresh => {}
        RefreshOutcome::Degraded(e) => {
            eprintln!("⚠️  Alias data unavailable ({}): {}", e.kind(), e);
            eprintln!("   Names will be shown unresolved.");
        }
    }

    Ok(cache)
}

async fn handle_tally(
    config: &Config,
    settings: &SettingsStore,
    args: &TallyArgs,
    quiet: bool,
) -> Result<()> {
    let loader = SourceLoader::from_config(&config.sources)?;
    let current = settings.current();

    let mode = args.mode.unwrap_or(
        if config.engine.alias_mode && current.alias_mode_active {
            TallyMode::Alias
        } else {
            TallyMode::Name
        },
    );
    let options = ReportOptions {
        limit: args.limit.or(config.report.limit),
        show_membership: config.report.show_membership && current.show_membership,
        show_masters: current.show_masters,
    };

    let needs_snapshot =
        mode == TallyMode::Alias || options.show_membership || options.show_masters;
    let cache = if needs_snapshot {
        Some(load_cache(config, settings, &loader, quiet).await?)
    } else {
        None
    };
    let snapshot = cache.as_ref().and_then(|c| c.current_snapshot());

    let nation = canonicalize(&args.nation);
    let records = load_records(
        config,
        &loader,
        &nation,
        args.role,
        args.input.as_deref(),
        quiet,
    )
    .await?;

    let empty = AliasIndex::default();
    let aliases = snapshot.as_ref().map(|s| &s.aliases).unwrap_or(&empty);
    let groups = unsmurf::analysis::tally(&records, args.role, args.kind, mode, aliases);

    let metadata = ReportMetadata {
        nation: nation.clone(),
        role: args.role,
        kind: args.kind,
        mode,
        generated_at: Utc::now(),
        snapshot_built_at: None,
        total_count: 0,
        group_count: 0,
    };
    let report = report::build_report(metadata, &groups, options, snapshot.as_deref());

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "\n📊 {} {} across {} identities ({} merged)",
                    report.metadata.total_count,
                    args.kind,
                    report.metadata.group_count,
                    unsmurf::analysis::merged_groups(&groups)
                );
                println!("✅ Report saved to: {}", path.display());
            }
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Read trades from `input`, or fetch those where `nation` is the
/// counterpart of `role`.
async fn load_records(
    config: &Config,
    loader: &SourceLoader,
    nation: &str,
    role: Role,
    input: Option<&Path>,
    quiet: bool,
) -> Result<Vec<TradeRecord>> {
    if let Some(input) = input {
        let path = input.to_string_lossy();
        return Ok(source::read_trades(loader, &path).await?);
    }

    let pb = spinner(&format!("Fetching trades of {}...", nation), quiet)?;
    let fetched = source::fetch_trades(
        loader,
        &config.sources.trades_api,
        role.counterpart(),
        nation,
    )
    .await;
    pb.finish_and_clear();
    fetched.with_context(|| format!("Failed to fetch trades of {}", nation))
}

/// Load the card name table, or an empty one when it is unset or fails.
async fn load_card_names(config: &Config, loader: &SourceLoader) -> CardNames {
    let Some(ref location) = config.sources.card_names else {
        return CardNames::default();
    };

    match loader.load_card_names(location).await {
        Ok(cards) => cards,
        Err(e) => {
            warn!("Card names unavailable ({}): {}", e.kind(), e);
            CardNames::default()
        }
    }
}

async fn handle_trades(
    config: &Config,
    settings: &SettingsStore,
    args: &ListArgs,
    quiet: bool,
) -> Result<()> {
    let loader = SourceLoader::from_config(&config.sources)?;
    let current = settings.current();

    let options = ReportOptions {
        limit: args.limit.or(config.report.limit),
        show_membership: config.report.show_membership && current.show_membership,
        show_masters: current.show_masters,
    };

    let cache = if options.show_membership || options.show_masters {
        Some(load_cache(config, settings, &loader, quiet).await?)
    } else {
        None
    };
    let snapshot = cache.as_ref().and_then(|c| c.current_snapshot());

    let nation = canonicalize(&args.nation);
    let (records, cards) = tokio::join!(
        load_records(
            config,
            &loader,
            &nation,
            args.role,
            args.input.as_deref(),
            quiet,
        ),
        load_card_names(config, &loader)
    );
    let records = records?;

    let metadata = ListingMetadata {
        nation: nation.clone(),
        role: args.role,
        kind: args.kind,
        generated_at: Utc::now(),
        snapshot_built_at: None,
        record_count: 0,
    };
    let listing = report::build_listing(
        metadata,
        &records,
        args.role,
        args.kind,
        options,
        snapshot.as_deref(),
        &cards,
    );

    let output = match args.format {
        OutputFormat::Json => report::generate_json_listing(&listing)?,
        OutputFormat::Markdown => report::generate_markdown_listing(&listing),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write listing to {}", path.display()))?;
            if !quiet {
                println!(
                    "\n📋 Listed {} of {} {}",
                    listing.rows.len(),
                    listing.metadata.record_count,
                    args.kind
                );
                println!("✅ Listing saved to: {}", path.display());
            }
        }
        None => print!("{}", output),
    }

    Ok(())
}

async fn handle_puppets(
    config: &Config,
    settings: &SettingsStore,
    master: &str,
    quiet: bool,
) -> Result<()> {
    let loader = SourceLoader::from_config(&config.sources)?;
    let cache = load_cache(config, settings, &loader, quiet).await?;
    let Some(snapshot) = cache.current_snapshot() else {
        anyhow::bail!("No alias data is available");
    };

    let master_id = canonicalize(master);
    let puppets = snapshot.aliases.aliases_of(&master_id);

    if puppets.is_empty() {
        println!("{} has no registered puppets.", master_id);
        if let Some(entry) = snapshot.aliases.get(&master_id) {
            println!("   It is itself a puppet of {}.", entry.master_id);
        }
        return Ok(());
    }

    println!("🧸 {} puppets of {}:", puppets.len(), master_id);
    for puppet in puppets {
        let tag = snapshot
            .aliases
            .get(puppet)
            .and_then(|entry| entry.source_tag.as_deref())
            .unwrap_or("-");
        let marker = if snapshot.membership.contains(puppet) {
            ""
        } else {
            " (not current)"
        };
        println!("   {} [{}]{}", puppet, tag, marker);
    }

    Ok(())
}

async fn handle_resolve(
    config: &Config,
    settings: &SettingsStore,
    names: &[String],
    quiet: bool,
) -> Result<()> {
    let loader = SourceLoader::from_config(&config.sources)?;
    let cache = load_cache(config, settings, &loader, quiet).await?;

    for name in names {
        let puppet_id = canonicalize(name);
        let entry = cache.resolve(&puppet_id);
        match entry.source_tag {
            Some(ref tag) => println!("{} -> {} ({})", puppet_id, entry.master_id, tag),
            None => println!("{} -> {} (not in any alias table)", puppet_id, entry.master_id),
        }
    }

    Ok(())
}

fn handle_normalize(labels: &[String]) {
    for label in labels {
        println!("{} -> {}", label, normalize_name(label));
    }
}

/// Merge every alias table into one local TSV and export the membership
/// list, skipping sources that fail.
async fn handle_collect(
    config: &Config,
    output: &Path,
    members_output: &Path,
    quiet: bool,
) -> Result<()> {
    let loader = SourceLoader::from_config(&config.sources)?;
    let tables = &config.sources.alias_tables;

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(tables.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    };

    let mut rows = Vec::new();
    for table in tables {
        pb.set_message(table.name.clone());
        rows.extend(loader.collect_alias_rows(std::slice::from_ref(table)).await);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let membership = &config.sources.membership;
    let members = match loader
        .load_membership(&membership.location, membership.format)
        .await
    {
        Ok(members) => members,
        Err(e) => {
            warn!("Skipping membership export ({}): {}", e.kind(), e);
            Vec::new()
        }
    };

    if rows.is_empty() && members.is_empty() {
        anyhow::bail!("No alias rows or members could be collected");
    }

    if rows.is_empty() {
        warn!("No alias rows collected, leaving {} untouched", output.display());
    } else {
        std::fs::write(output, source::alias_rows_to_tsv(&rows))
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!(
            "✅ Collected {} alias rows from {} tables into {}",
            rows.len(),
            tables.len(),
            output.display()
        );
    }

    if !members.is_empty() {
        std::fs::write(members_output, source::membership_to_text(&members))
            .with_context(|| format!("Failed to write {}", members_output.display()))?;
        println!(
            "✅ Exported {} current nations into {}",
            members.len(),
            members_output.display()
        );
    }

    Ok(())
}

/// Print the settings, saving any changes given on the command line first.
fn handle_settings(config: &Config, settings: &SettingsStore, args: &SettingsArgs) -> Result<()> {
    let change = args.change();
    let mut updates = settings.subscribe();

    if !change.is_empty() {
        settings.update(|s| change.apply(s))?;
        if updates.has_changed().unwrap_or(false) {
            debug!("Settings changed: {:?}", *updates.borrow_and_update());
        }
        println!("✅ Settings saved");
    }

    let current = settings.current();
    let window = settings.cache_window(config.engine.cache_window());
    println!("⚙️  Settings");
    println!("   alias mode:      {}", on_off(current.alias_mode_active));
    match current.cache_window_override_hours {
        Some(hours) => println!("   cache window:    {}h", hours),
        None => println!(
            "   cache window:    {}h (configured)",
            window.as_secs() / 3600
        ),
    }
    println!("   show masters:    {}", on_off(current.show_masters));
    println!("   show membership: {}", on_off(current.show_membership));
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
