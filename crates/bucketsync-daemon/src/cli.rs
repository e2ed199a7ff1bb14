//! Flat CLI flag set. This daemon exposes one flat set of flags rather than
//! a subcommand-per-verb CLI — there is exactly one thing to run.

use std::path::PathBuf;

use bucketsync_core::config::{Config, ConfigBuilder, Verbosity};
use clap::Parser;

fn parse_verbosity(s: &str) -> Result<Verbosity, String> {
    s.parse()
}

/// Watches `root`'s immediate subdirectories as target buckets and uploads
/// every file appearing beneath them to the identically-named remote bucket.
#[derive(Debug, Parser)]
#[command(
    name = "bucketsyncd",
    about = "Watch a directory tree and synchronize it to S3-compatible buckets",
    disable_help_flag = true
)]
pub struct Cli {
    /// Watched root; immediate subdirectories are bucket names.
    #[arg(short = 'r', long = "root")]
    pub root: PathBuf,

    /// Synchronize-service period in seconds; 0 disables it.
    #[arg(short = 'i', long = "interval", default_value_t = 10)]
    pub interval: u64,

    /// `sweepCount` per tick per bucket; 0 disables the synchronize service.
    #[arg(short = 'c', long = "count", default_value_t = 10)]
    pub count: u32,

    /// `maxActivePerBucket`.
    #[arg(short = 'b', long = "bucket_max", default_value_t = 10)]
    pub bucket_max: usize,

    /// Upload timeout in seconds.
    #[arg(short = 't', long = "timeout", default_value_t = 10)]
    pub timeout: u64,

    /// Attempts before a ledger row is tombstoned.
    #[arg(short = 'f', long = "fail_limit", default_value_t = 10)]
    pub fail_limit: u32,

    /// Reachability-probe period in seconds; 0 disables it (network always up).
    #[arg(short = 'p', long = "ping_interval", default_value_t = 10)]
    pub ping_interval: u64,

    /// Post-upload verification timeout in milliseconds; 0 disables verification.
    #[arg(short = 'a', long = "aws_check_timeout", default_value_t = 0)]
    pub aws_check_timeout: u64,

    /// Ledger-maintenance period in seconds; 0 disables it.
    #[arg(short = 'd', long = "database_cleanup_interval", default_value_t = 10)]
    pub database_cleanup_interval: u64,

    /// Sweep-once mode: reconcile every bucket against disk, ignoring the
    /// ledger, then exit without watching.
    #[arg(short = 's', long = "sweep")]
    pub sweep: bool,

    /// Log floor.
    #[arg(
        short = 'v',
        long = "verbosity",
        default_value = "info",
        value_parser = parse_verbosity
    )]
    pub verbosity: Verbosity,

    /// Prints usage. Exits 1 rather than clap's usual exit-0-on-help
    /// convention, matching this daemon's flat exit-code policy: 0 on clean
    /// shutdown, 1 on any configuration or credential error.
    #[arg(short = 'h', long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    /// Converts the parsed flags into a [`Config`].
    #[must_use]
    pub fn into_config(self) -> Config {
        ConfigBuilder::new(self.root)
            .sweep_interval_secs(self.interval)
            .sweep_count(self.count)
            .max_active_per_bucket(self.bucket_max)
            .upload_timeout_secs(self.timeout)
            .fail_limit(self.fail_limit)
            .ping_interval_secs(self.ping_interval)
            .verify_timeout_ms(self.aws_check_timeout)
            .clean_interval_secs(self.database_cleanup_interval)
            .sweep_once(self.sweep)
            .verbosity(self.verbosity)
            .build()
    }
}
