use clap::{Parser, Subcommand};

/// UEMS database bootstrap: schema migrations and baseline accounts
#[derive(Debug, Parser)]
#[command(name = "uems-bootstrap", version)]
pub struct Cli {
    /// Create the configured database first if it does not exist
    #[arg(long, global = true)]
    pub create_database: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The subcommand to run; `init` when none is given
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Database(DatabaseCommand::Init))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Database(DatabaseCommand),

    /// Check that entity and migration definitions are where the
    /// configuration expects them
    VerifyConfig,
}

/// Subcommands that connect to the database
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum DatabaseCommand {
    /// Apply pending migrations and ensure the administrator account
    Init,

    /// Apply pending migrations
    Migrate,

    /// Revert the most recently applied migration
    Revert,

    /// Show applied and pending migrations
    Status,

    /// Ensure the administrator account
    Seed {
        /// Also create the demo accounts (refused in production)
        #[arg(long)]
        with_samples: bool,
    },
}
