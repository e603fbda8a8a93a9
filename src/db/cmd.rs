use std::{
    io,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::Command,
};
use secrecy::ExposeSecret;
use tokio_postgres::IsolationLevel;

use crate::{config::Config, prelude::*};
use super::{Db, DbConfig, create_pool};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum DbCommand {
    /// Removes all data and tables from the database.
    Clear,

    /// Runs an `.sql` script with the configured database connection.
    Script {
        /// Path to a file containing an SQL script.
        script: PathBuf,
    },

    /// Runs the database migrations that also automatically run when starting
    /// the server.
    Migrate,

    /// Connects to the database and gives you an SQL prompt.
    /// This just starts the `psql` client, so make sure that is installed
    /// and accessible in your `PATH`.
    Console,

    /// Equivalent to `db clear` followed by `db migrate`.
    Reset,
}

/// Entry point for `db` commands.
pub(crate) async fn run(cmd: &DbCommand, config: &Config) -> Result<()> {
    if let DbCommand::Console = cmd {
        return console(&config.db);
    }

    // Connect to database
    let pool = create_pool(&config.db).await?;
    let mut db = pool.get().await?;

    // Dispatch command
    match cmd {
        DbCommand::Clear => clear(&mut db).await?,
        DbCommand::Migrate => super::migrate(&mut db).await?,
        DbCommand::Reset => {
            clear(&mut db).await?;
            super::migrate(&mut db).await?;
        }
        DbCommand::Script { script } => run_script(&db, script).await?,
        DbCommand::Console => unreachable!("already handled above"),
    }

    Ok(())
}


/// Clears the whole database by removing and re-creating the `public` schema.
///
/// This has an interactive check, asking the user to confirm the removal.
async fn clear(db: &mut Db) -> Result<()> {
    bunt::println!("{$red+bold}This will remove all data and tables from the database!{/$}");
    bunt::println!("Type {$bold}yes{/$} to confirm.");
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("could not read from stdin")?;
    if line.trim() != "yes" {
        println!("Aborted.");
        return Ok(());
    }

    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    tx.batch_execute("drop schema public cascade; create schema public;")
        .await
        .context("failed to clear database")?;
    tx.commit().await.context("failed to commit clear transaction")?;

    info!("Removed everything from the database");
    Ok(())
}

async fn run_script(db: &Db, script_path: &Path) -> Result<()> {
    let script = std::fs::read_to_string(script_path)
        .context(format!("failed to read script file '{}'", script_path.display()))?;

    db.batch_execute(&script).await.context("failed to execute script")?;
    info!("Successfully ran SQL script");

    Ok(())
}

fn console(config: &DbConfig) -> Result<()> {
    let mut command = Command::new("psql");
    command.arg(format!(
        "postgresql://{}@{}:{}/{}",
        config.user,
        config.host,
        config.port,
        config.database,
    ));
    command.env("PGPASSWORD", config.password.expose_secret());

    // This only returns if `psql` could not be started at all.
    let error = command.exec();
    Err(error).context("failed to start `psql`")
}
