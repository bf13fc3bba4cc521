//! # UEMS Bootstrap
//!
//! Prepares a database for UEMS: applies schema migrations and creates the
//! administrator account. Safe to run on every deploy.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p uems-bootstrap                        # init
//! cargo run -p uems-bootstrap -- status
//! cargo run -p uems-bootstrap -- seed --with-samples
//! ```
//!
//! Progress goes to stdout. The process exits with 0 on success and 1 on
//! any failure.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uems_bootstrap::cli::{Cli, Command, DatabaseCommand};
use uems_bootstrap::credentials::{admin_password_from_env, AdminPassword};
use uems_bootstrap::{bootstrap::verify_layout, Bootstrap, BootstrapError};
use uems_shared::config::AppConfig;
use uems_shared::db::migrator::Migrator;
use uems_shared::db::seed::{SeedOutcome, ADMIN_USERNAME};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uems_bootstrap=info,uems_shared=info,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .without_time()
                .with_target(false),
        )
        .init();

    tracing::info!("UEMS bootstrap v{}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().map_err(BootstrapError::from)?;

    tracing::info!(environment = %config.environment, "Configuration resolved");

    let command = match cli.command() {
        Command::VerifyConfig => return verify_config(&config),
        Command::Database(command) => command,
    };

    // resolve before connecting so a weak override fails fast
    let admin_password = match command {
        DatabaseCommand::Init | DatabaseCommand::Seed { .. } => {
            Some(admin_password_from_env(config.environment)?)
        }
        _ => None,
    };

    let bootstrap = Bootstrap::connect(config, cli.create_database).await?;
    let result = execute(&bootstrap, &command, admin_password.as_ref()).await;
    bootstrap.close().await;
    result
}

async fn execute(
    bootstrap: &Bootstrap,
    command: &DatabaseCommand,
    admin_password: Option<&AdminPassword>,
) -> anyhow::Result<()> {
    match command {
        DatabaseCommand::Init => {
            let password = admin_password.context("administrator password not resolved")?;
            let report = bootstrap.init(password).await?;
            announce_admin(report.admin, password);
        }
        DatabaseCommand::Migrate => {
            for migration in bootstrap.migrate().await? {
                println!("Applied {} ({})", migration.name, migration.version);
            }
        }
        DatabaseCommand::Revert => {
            if let Some(migration) = bootstrap.revert().await? {
                println!("Reverted {} ({})", migration.name, migration.version);
            }
        }
        DatabaseCommand::Status => {
            let status = bootstrap.status().await?;
            println!("Applied migrations: {}", status.applied_migrations);
            if let Some(version) = status.latest_version {
                println!("Latest version:     {version}");
            }
            for name in &status.pending {
                println!("[ ] {name}");
            }
            if status.is_up_to_date {
                println!("Database schema is up to date");
            }
        }
        DatabaseCommand::Seed { with_samples } => {
            let password = admin_password.context("administrator password not resolved")?;
            let admin = bootstrap.ensure_admin(password).await?;
            announce_admin(admin, password);

            if *with_samples {
                for (seed, outcome) in bootstrap.seed_samples().await? {
                    if outcome.is_created() {
                        println!(
                            "Created sample account {} ({}) with password {}",
                            seed.username,
                            seed.role.as_str(),
                            seed.password
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn announce_admin(outcome: SeedOutcome, password: &AdminPassword) {
    match outcome {
        SeedOutcome::Created { .. } if password.should_display() => {
            println!();
            println!("Administrator account created");
            println!("  username: {ADMIN_USERNAME}");
            println!("  password: {}", password.value());
            println!("This password is shown once. Change it after the first login.");
            println!();
        }
        SeedOutcome::Created { .. } => {
            println!("Administrator account created with the configured password");
        }
        SeedOutcome::AlreadyExists { .. } => {
            println!("Administrator account already exists");
        }
    }
}

fn verify_config(config: &AppConfig) -> anyhow::Result<()> {
    let registered = Migrator::with_defaults().names();
    let report = verify_layout(&config.layout, &registered);

    println!("Entities   {} ({} file(s))", config.layout.entities, report.entities.len());
    println!("Migrations {} ({} file(s))", config.layout.migrations, report.migrations.len());

    for issue in &report.issues {
        println!("  ! {issue}");
    }

    if report.is_ok() {
        println!("Configuration OK");
        Ok(())
    } else {
        Err(BootstrapError::Layout {
            count: report.issues.len(),
        }
        .into())
    }
}
