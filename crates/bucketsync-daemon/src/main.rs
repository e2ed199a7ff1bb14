//! bucketsyncd — entry point
//!
//! Parses flags, sources credentials from the environment, installs the log
//! sink, opens the ledger, bootstraps the coordinator, and runs one of the
//! two modes. Exit codes: 0 on clean shutdown, 1 on a configuration,
//! credential, or unreadable-root error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod cli;
mod coordinator;
mod logging;

use cli::Cli;
use coordinator::Coordinator;
use bucketsync_ledger::{LedgerPool, NullLedger, SqliteLedger};
use bucketsync_remote::{EnvCredentials, S3ObjectStore};

const LEDGER_FILE_NAME: &str = "bucketsync.db";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap's `DisplayHelp`/`DisplayVersion` kinds print their own
            // message to stdout; every other parse failure prints to
            // stderr. Either way this daemon's exit-code policy is flat:
            // anything short of a full run is a configuration error.
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    let config = cli.into_config();
    logging::install(config.verbosity);

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            error!(%error, "invalid configuration");
        }
        return ExitCode::FAILURE;
    }

    let credentials = match EnvCredentials::from_env() {
        Ok(credentials) => credentials,
        Err(err) => {
            error!(error = %err, "missing AWS credentials");
            return ExitCode::FAILURE;
        }
    };

    // Sweep-once mode ignores the ledger entirely (no filtering, no delivery
    // record), so it never touches the backing SQLite file.
    let sweep_once = config.sweep_once;
    let ledger: std::sync::Arc<dyn bucketsync_core::ports::Ledger> = if sweep_once {
        std::sync::Arc::new(NullLedger)
    } else {
        let db_path = PathBuf::from(LEDGER_FILE_NAME);
        let ledger_pool = match LedgerPool::open(&db_path).await {
            Ok(pool) => pool,
            Err(err) => {
                error!(error = %err, path = %db_path.display(), "could not open ledger");
                return ExitCode::FAILURE;
            }
        };
        std::sync::Arc::new(SqliteLedger::new(ledger_pool, config.fail_limit))
    };
    let remote = std::sync::Arc::new(S3ObjectStore::new(credentials).await);
    let coordinator = match Coordinator::bootstrap(config, remote, ledger).await {
        Ok(coordinator) => coordinator,
        Err(err) => {
            error!(error = %err, "could not bootstrap coordinator");
            return ExitCode::FAILURE;
        }
    };

    if sweep_once {
        coordinator.sweep_once().await;
        return ExitCode::SUCCESS;
    }

    match coordinator.run_daemon().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "daemon exited with an error");
            ExitCode::FAILURE
        }
    }
}
