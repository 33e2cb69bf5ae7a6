use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlstep_migrate::{ChangesetState, MigrateConfig, MigrateError, MigrationSource, Runner, SslMode};

#[derive(Parser)]
#[command(name = "sqlstep")]
#[command(about = "Apply versioned SQL changesets to Postgres, exactly once, in order")]
#[command(version)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// TLS requirement for the connection (disable, prefer, require)
    #[arg(long, env = "SQLSTEP_SSL_MODE", default_value = "prefer", global = true)]
    ssl_mode: SslMode,

    /// Directory containing the changeset files
    #[arg(long, env = "SQLSTEP_MIGRATIONS_DIR", default_value = "migrations", global = true)]
    dir: String,

    /// Ledger table recording applied changesets
    #[arg(long, env = "SQLSTEP_LEDGER_TABLE", default_value = "sqlstep_migrations", global = true)]
    table: String,

    /// Maximum connections in the pool
    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending changesets, in ascending name order
    Run,

    /// Show the applied/pending state of every available changeset
    Status {
        /// Emit the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new timestamped changeset file in the source directory
    Create {
        /// Changeset name (becomes part of the file name)
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = execute(cli).await {
        match err.downcast_ref::<MigrateError>().and_then(|e| e.changeset_name()) {
            Some(name) => tracing::error!(changeset = %name, "migration run failed: {err:#}"),
            None => tracing::error!("migration run failed: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run => {
            let runner = Runner::new(config(&cli)?);
            let report = runner.run().await?;
            if report.applied_count() == 0 {
                println!(
                    "Database is up to date ({} changeset(s) already applied)",
                    report.skipped_count
                );
            } else {
                for name in &report.applied {
                    println!("Applied {}", name);
                }
                println!(
                    "Applied {} changeset(s) in {}ms",
                    report.applied_count(),
                    report.execution_time_ms
                );
            }
            Ok(())
        }

        Commands::Status { json } => {
            let runner = Runner::new(config(&cli)?);
            let statuses = runner.status().await?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
                return Ok(());
            }

            if statuses.is_empty() {
                println!("No changesets found in '{}'", cli.dir);
                return Ok(());
            }
            for status in statuses {
                match status.state {
                    ChangesetState::Applied { applied_at } => {
                        println!("  applied {} ({})", status.name, applied_at.to_rfc3339());
                    }
                    ChangesetState::Pending => {
                        println!("  pending {}", status.name);
                    }
                }
            }
            Ok(())
        }

        Commands::Create { name } => {
            let source = MigrationSource::new(&cli.dir);
            let path = source.create_changeset(name)?;
            println!("Created changeset: {}", path.display());
            Ok(())
        }
    }
}

fn config(cli: &Cli) -> anyhow::Result<MigrateConfig> {
    let database_url = cli
        .database_url
        .clone()
        .context("no database url given (set DATABASE_URL or pass --database-url)")?;

    Ok(MigrateConfig::new(database_url)
        .with_ssl_mode(cli.ssl_mode)
        .with_migrations_dir(&cli.dir)
        .with_ledger_table(&cli.table)
        .with_max_connections(cli.max_connections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli_with(database_url: Option<&str>) -> Cli {
        Cli {
            database_url: database_url.map(str::to_string),
            ssl_mode: SslMode::Require,
            dir: "db/changes".to_string(),
            table: "app_ledger".to_string(),
            max_connections: 3,
            command: Commands::Run,
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_carries_all_flags_through() {
        let config = config(&cli_with(Some("postgres://localhost/app"))).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/app");
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(config.migrations_dir.to_str(), Some("db/changes"));
        assert_eq!(config.ledger_table, "app_ledger");
        assert_eq!(config.max_connections, 3);
    }

    #[test]
    fn config_requires_a_database_url() {
        let err = config(&cli_with(None)).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
