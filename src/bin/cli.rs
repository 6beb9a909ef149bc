use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use tenant_tasks::audit;
use tenant_tasks::authz::{CatalogConfig, PermissionCatalog, RbacEvaluator};
use tenant_tasks::services::users;

#[derive(Parser, Debug)]
#[command(author, version, about = "tenant-tasks operations tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Create the first account with the top role and no organization
    CreateOwner {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Validate a role catalog file (defaults to RBAC_CATALOG_PATH or the built-in catalog)
    CheckCatalog { path: Option<PathBuf> },
    /// Recompute the audit log hash chain
    VerifyAudit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::CreateOwner { email, password } => {
            let pool = get_pool().await?;
            let catalog = CatalogConfig::from_env()?;
            let user = users::bootstrap_owner(&pool, &catalog, &email, &password).await?;
            println!("Created {} ({}) with role {}", user.email, user.id, user.role);
        }
        Commands::CheckCatalog { path } => {
            let config = match path {
                Some(path) => CatalogConfig::from_file(&path)?,
                None => CatalogConfig::from_env()?,
            };
            let rbac = RbacEvaluator::new(PermissionCatalog::from_config(&config)?);
            print_catalog(&rbac);
        }
        Commands::VerifyAudit => {
            let pool = get_pool().await?;
            let report = audit::verify_chain(&pool).await?;
            match report.first_broken {
                None => println!("audit chain intact ({} entries)", report.entries),
                Some(seq) => anyhow::bail!("audit chain broken at seq {} ({} entries checked)", seq, report.entries),
            }
        }
    }

    Ok(())
}

fn print_catalog(rbac: &RbacEvaluator) {
    let catalog = rbac.catalog();
    println!("{:<12} {:<12} {:<6} {}", "Role", "Parent", "Rank", "Effective permissions");
    for name in catalog.role_names() {
        let marker = if rbac.is_top_role(name) { " (top)" } else { "" };
        let permissions: Vec<String> = rbac.effective_permissions(name).into_iter().collect();
        println!(
            "{:<12} {:<12} {:<6} {}{}",
            name,
            catalog.parent_of(name).unwrap_or("-"),
            catalog.rank_of(name),
            permissions.join(", "),
            marker
        );
    }
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let filename = format!("{}_{}.sql", timestamp, sanitize_name(name));
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let options = database_url
        .parse::<SqliteConnectOptions>()
        .context("invalid DATABASE_URL")?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;

    let applied_versions: HashSet<i64> = if has_table.is_some() {
        sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
            .iter()
            .filter_map(|row| row.try_get::<i64, _>("version").ok())
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        println!("{:<8} {:<20} {}", status, migration.version, if desc.is_empty() { "unknown" } else { desc });
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate's own folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
