use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use fundacion_portal::backend::{BackendError, SqliteBackend};
use fundacion_portal::models::profile::{AccountStatus, Role};

#[derive(Parser, Debug)]
#[command(author, version, about = "fundacion-portal admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Mark an account's email as verified
    ConfirmEmail { email: String },
    /// Change the role of the profile registered with EMAIL
    SetRole { email: String, role: String },
    /// Change the status of the profile registered with EMAIL
    SetStatus { email: String, status: String },
    /// Print the newest unused password recovery token for EMAIL
    RecoveryToken { email: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = get_pool().await?;

    match cli.command {
        Commands::MigrateRun => {
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::ConfirmEmail { email } => {
            let backend = SqliteBackend::new(pool);
            let principal = backend
                .confirm_email(&email)
                .await
                .map_err(|err| not_found_as(err, &email))?;
            println!("Email confirmed for {} ({})", principal.email, principal.id);
        }
        Commands::SetRole { email, role } => {
            let backend = SqliteBackend::new(pool);
            let profile = backend
                .profile_by_email(&email)
                .await
                .map_err(|err| not_found_as(err, &email))?;
            let updated = backend.set_role(profile.id, &Role::from(role)).await?;
            println!("{} is now {}", updated.email, updated.role);
        }
        Commands::SetStatus { email, status } => {
            let backend = SqliteBackend::new(pool);
            let profile = backend
                .profile_by_email(&email)
                .await
                .map_err(|err| not_found_as(err, &email))?;
            let updated = backend.set_status(profile.id, &AccountStatus::from(status)).await?;
            println!("{} is now {}", updated.email, updated.status);
        }
        Commands::RecoveryToken { email } => {
            let backend = SqliteBackend::new(pool);
            let token = backend
                .pending_recovery_token(&email)
                .await
                .map_err(|err| not_found_as(err, &email))?;
            println!("{token}");
        }
    }

    Ok(())
}

fn not_found_as(err: BackendError, email: &str) -> anyhow::Error {
    match err {
        BackendError::NotFound => anyhow::anyhow!("no account found for {email}"),
        other => other.into(),
    }
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let options = database_url
        .parse::<SqliteConnectOptions>()
        .context("invalid DATABASE_URL")?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root). If that
    // doesn't exist (common in containers where CWD differs), fall back to
    // the crate-local migrations folder determined by CARGO_MANIFEST_DIR.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
