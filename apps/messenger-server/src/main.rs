use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use messenger::config::MessengerConfig;
use messenger::Messenger;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const MODULE_NAME: &str = "messenger";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
/// - Adds `mode=rwc` so a missing database file is created.
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if is_memory_dsn(dsn) {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if let Some(dir) = p.parent() {
        if create_dirs {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    match query {
        Some(q) if q.split('&').any(|kv| kv.starts_with("mode=")) => {
            out.push('?');
            out.push_str(q);
        }
        Some(q) => {
            out.push('?');
            out.push_str(q);
            out.push_str("&mode=rwc");
        }
        None => out.push_str("?mode=rwc"),
    }
    Ok(out)
}

fn is_memory_dsn(dsn: &str) -> bool {
    dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
}

/// Messenger operator tool: schema migrations and configuration checks
#[derive(Parser)]
#[command(name = "messenger-server")]
#[command(about = "Messenger operator tool: schema migrations and configuration checks")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the database and apply pending migrations
    Migrate,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.home_dir));
    tracing::info!("Messenger server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Migrate) {
        Commands::Migrate => migrate(config).await,
        Commands::Check => check_config(config),
    }
}

/// Only sqlite is compiled in.
fn ensure_sqlite(cfg: &DatabaseConfig) -> Result<()> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }
    if is_memory_dsn(raw) {
        return Ok(());
    }

    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;
    match url.scheme() {
        "sqlite" => Ok(()),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

async fn connect(cfg: &DatabaseConfig, base_dir: &Path) -> Result<DatabaseConnection> {
    ensure_sqlite(cfg)?;
    let dsn = absolutize_sqlite_dsn(cfg.url.trim(), base_dir, true)?;

    let mut opts = ConnectOptions::new(dsn.clone());
    // Every in-memory connection is its own database.
    let max_conns = if is_memory_dsn(&dsn) {
        1
    } else {
        cfg.max_conns.unwrap_or(10)
    };
    opts.max_connections(max_conns)
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);
    if let Some(ms) = cfg.busy_timeout_ms {
        opts.map_sqlx_sqlite_opts(move |o| o.busy_timeout(Duration::from_millis(u64::from(ms))));
    }

    tracing::info!("Connecting to database: {}", dsn);
    Database::connect(opts)
        .await
        .with_context(|| format!("failed to connect to {dsn}"))
}

async fn migrate(config: AppConfig) -> Result<()> {
    let base_dir = PathBuf::from(&config.home_dir);
    let db_config = config
        .database
        .clone()
        .ok_or_else(|| anyhow!("No database configuration found"))?;
    let module_cfg: MessengerConfig = config.module_config(MODULE_NAME)?;

    let db = connect(&db_config, &base_dir).await?;
    Messenger::migrate(&db).await?;

    // Wiring the module verifies the asset directory as well.
    let module = Messenger::init(db, module_cfg, &base_dir).await?;
    println!("Migrations applied");
    println!("Assets directory: {}", module.assets_root().display());
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    if let Some(db) = &config.database {
        ensure_sqlite(db)?;
    } else {
        tracing::warn!("No database configuration found");
    }
    let module_cfg: MessengerConfig = config
        .module_config(MODULE_NAME)
        .context("invalid messenger module config")?;
    tracing::debug!(?module_cfg, "Messenger module config");

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_dsn_is_kept() {
        let base = Path::new("/tmp");
        assert_eq!(
            absolutize_sqlite_dsn("sqlite::memory:", base, false).unwrap(),
            "sqlite::memory:"
        );
        assert_eq!(
            absolutize_sqlite_dsn("sqlite://:memory:", base, false).unwrap(),
            "sqlite::memory:"
        );
    }

    #[test]
    fn relative_dsn_is_joined_with_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = absolutize_sqlite_dsn("sqlite://database/messenger.db", dir.path(), true).unwrap();

        let expected = format!(
            "sqlite://{}?mode=rwc",
            dir.path()
                .join("database/messenger.db")
                .to_string_lossy()
                .replace('\\', "/")
        );
        assert_eq!(dsn, expected);
        assert!(dir.path().join("database").is_dir());
    }

    #[test]
    fn existing_mode_is_preserved() {
        let dsn = absolutize_sqlite_dsn("sqlite:///var/db/m.db?mode=ro", Path::new("/"), false)
            .unwrap();
        assert_eq!(dsn, "sqlite:///var/db/m.db?mode=ro");

        let dsn = absolutize_sqlite_dsn("sqlite:///var/db/m.db?cache=shared", Path::new("/"), false)
            .unwrap();
        assert_eq!(dsn, "sqlite:///var/db/m.db?cache=shared&mode=rwc");
    }

    #[test]
    fn non_sqlite_dsn_is_rejected() {
        let cfg = DatabaseConfig {
            url: "postgres://localhost/db".to_string(),
            max_conns: None,
            busy_timeout_ms: None,
        };
        assert!(ensure_sqlite(&cfg).is_err());
        assert!(absolutize_sqlite_dsn(&cfg.url, Path::new("/"), false).is_err());
    }
}
