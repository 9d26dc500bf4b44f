use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use gator::config::Config;
use gator::feed::Fetcher;
use gator::scheduler::Scheduler;
use gator::storage::{Account, Database, DatabaseError, Source, SourceStore};
use gator::util::{strip_control_chars, validate_url};

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "RSS/Atom feed aggregator")]
struct Args {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the config file
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and make it the current user
    Register { name: String },
    /// Switch the current user to an existing account
    Login { name: String },
    /// List accounts
    Users,
    /// Delete all accounts, sources and posts
    Reset,
    /// Register a feed and follow it as the current user
    Addfeed { name: String, url: String },
    /// List all registered feeds
    Feeds,
    /// Follow a registered feed as the current user
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Poll feeds round-robin until interrupted
    Agg {
        /// Seconds between polls (overrides poll_interval_secs)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Fetch and ingest one registered feed now
    Fetch {
        url: String,
        /// Print the ingestion report as JSON
        #[arg(long)]
        json: bool,
    },
}

struct AppState {
    config: Config,
    config_path: PathBuf,
    db: Database,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let args = Args::parse();
    let ctx = open_context(&args).await?;

    match args.command {
        Command::Register { name } => register(ctx, &name).await,
        Command::Login { name } => login(ctx, &name).await,
        Command::Users => users(&ctx).await,
        Command::Reset => reset(&ctx).await,
        Command::Addfeed { name, url } => add_feed(&ctx, &name, &url).await,
        Command::Feeds => feeds(&ctx).await,
        Command::Follow { url } => follow(&ctx, &url).await,
        Command::Following => following(&ctx).await,
        Command::Unfollow { url } => unfollow(&ctx, &url).await,
        Command::Agg { interval } => aggregate(ctx, interval).await,
        Command::Fetch { url, json } => fetch_once(ctx, &url, json).await,
    }
}

/// Directives used when `RUST_LOG` is unset or unparseable
const DEFAULT_LOG_DIRECTIVES: &str = "gator=info";

/// `RUST_LOG` if set, otherwise info-level output for gator so per-source
/// failures and tick summaries show up by default.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

/// `--config`, or the default location under HOME
fn config_path(args: &Args) -> Result<PathBuf> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => Ok(Config::default_path()?),
    }
}

/// `--db`, then `database_path` from the config, then the default under HOME
fn database_path(args: &Args, config: &Config) -> Result<PathBuf> {
    match &args.db {
        Some(path) => Ok(path.clone()),
        None => Ok(config.resolve_database_path()?),
    }
}

async fn open_context(args: &Args) -> Result<AppState> {
    let config_path = config_path(args)?;
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = database_path(args, &config)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            bail!("The database at {} is locked by another process", db_path.display());
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    Ok(AppState {
        config,
        config_path,
        db,
    })
}

async fn register(mut ctx: AppState, name: &str) -> Result<()> {
    let account = ctx.db.create_account(name).await?;
    ctx.config.current_user = Some(account.name.clone());
    ctx.config.save(&ctx.config_path)?;
    println!("Registered {} (id {})", account.name, account.id);
    Ok(())
}

async fn login(mut ctx: AppState, name: &str) -> Result<()> {
    if ctx.db.account_by_name(name).await?.is_none() {
        bail!("No account named '{}'", name);
    }
    ctx.config.current_user = Some(name.to_string());
    ctx.config.save(&ctx.config_path)?;
    println!("Logged in as {}", name);
    Ok(())
}

async fn users(ctx: &AppState) -> Result<()> {
    let current = ctx.config.current_user.as_deref();
    for account in ctx.db.list_accounts().await? {
        if Some(account.name.as_str()) == current {
            println!("* {} (current)", account.name);
        } else {
            println!("* {}", account.name);
        }
    }
    Ok(())
}

async fn reset(ctx: &AppState) -> Result<()> {
    let removed = ctx.db.delete_all_accounts().await?;
    println!("Removed {} accounts and their feeds", removed);
    Ok(())
}

/// The account named by `current_user`
async fn current_account(ctx: &AppState) -> Result<Account> {
    let user = ctx
        .config
        .current_user
        .as_deref()
        .context("No current user; run `gator register <name>` first")?;
    ctx.db
        .account_by_name(user)
        .await?
        .with_context(|| format!("Current user '{}' no longer exists", user))
}

/// The registered source for `url`, matched in normalized form
async fn source_for_url(ctx: &AppState, url: &str) -> Result<Source> {
    let url = validate_url(url)?;
    ctx.db
        .source_by_url(url.as_str())
        .await?
        .with_context(|| format!("No feed registered for {}", url))
}

async fn add_feed(ctx: &AppState, name: &str, url: &str) -> Result<()> {
    let account = current_account(ctx).await?;
    let url = validate_url(url)?;

    let source = ctx.db.create_source(name, url.as_str(), account.id).await?;
    ctx.db.follow_source(account.id, source.id).await?;
    println!("Added {} ({}) for {}", source.name, source.url, account.name);
    Ok(())
}

async fn follow(ctx: &AppState, url: &str) -> Result<()> {
    let account = current_account(ctx).await?;
    let source = source_for_url(ctx, url).await?;

    ctx.db.follow_source(account.id, source.id).await?;
    println!(
        "{} now follows {}",
        account.name,
        strip_control_chars(&source.name)
    );
    Ok(())
}

async fn following(ctx: &AppState) -> Result<()> {
    let account = current_account(ctx).await?;
    for source in ctx.db.followed_sources(account.id).await? {
        println!("* {} ({})", strip_control_chars(&source.name), source.url);
    }
    Ok(())
}

async fn unfollow(ctx: &AppState, url: &str) -> Result<()> {
    let account = current_account(ctx).await?;
    let source = source_for_url(ctx, url).await?;

    ctx.db.unfollow_source(account.id, source.id).await?;
    println!(
        "{} unfollowed {}",
        account.name,
        strip_control_chars(&source.name)
    );
    Ok(())
}

async fn feeds(ctx: &AppState) -> Result<()> {
    for source in ctx.db.list_sources().await? {
        let last = source
            .last_fetched_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} at {} by {} (last fetched: {})",
            strip_control_chars(&source.name),
            source.url,
            strip_control_chars(&source.owner),
            last
        );
    }
    Ok(())
}

fn build_scheduler(ctx: AppState) -> Result<Scheduler<Database>> {
    let fetcher = Fetcher::new(&ctx.config.user_agent, ctx.config.fetch_timeout())
        .context("Failed to build HTTP client")?
        .max_bytes(ctx.config.max_feed_bytes);
    Ok(Scheduler::new(ctx.db, fetcher))
}

async fn aggregate(mut ctx: AppState, interval: Option<u64>) -> Result<()> {
    if let Some(secs) = interval {
        ctx.config.poll_interval_secs = secs;
    }
    ctx.config.validate()?;
    let interval = ctx.config.poll_interval();

    let scheduler = build_scheduler(ctx)?;
    let shutdown = shutdown_signal()?;

    println!("Collecting feeds every {:?}", interval);
    scheduler.run(interval, shutdown).await?;
    Ok(())
}

async fn fetch_once(ctx: AppState, url: &str, json: bool) -> Result<()> {
    ctx.config.validate()?;
    let scheduler = build_scheduler(ctx)?;
    let mut shutdown = shutdown_signal()?;

    let report = scheduler.ingest_url(url, &mut shutdown).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} created, {} duplicates, {} failed",
            report.created,
            report.duplicates,
            report.failed()
        );
        for failure in &report.failures {
            println!(
                "  {}: {}",
                failure.url.as_deref().unwrap_or("<no link>"),
                failure.error
            );
        }
    }
    Ok(())
}

/// Flips to `true` on Ctrl-C or SIGTERM.
fn shutdown_signal() -> Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm_fut => {}
        }
        tracing::info!("Shutdown requested");
        let _ = tx.send(true);
    });

    Ok(rx)
}
