//! Coordinator configuration
//!
//! Every CLI-tunable knob, collected into one `Config` value. `validate()`
//! accumulates every problem it finds rather than failing on the first bad
//! field.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Log floor, matching the `--verbosity` CLI flag's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    /// Only critical failures.
    Critical,
    /// Errors and above.
    Error,
    /// Warnings and above.
    Warn,
    /// Everything, including informational lines (the default).
    Info,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Info
    }
}

impl std::str::FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "invalid verbosity {other:?}, expected one of: critical, error, warn, info"
            )),
        }
    }
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        };
        write!(f, "{s}")
    }
}

/// One field failing validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Coordinator configuration, one field per CLI flag.
#[derive(Debug, Clone)]
pub struct Config {
    /// `--root` / `-r`: watched root; immediate subdirs are bucket names.
    pub root: PathBuf,
    /// `--interval` / `-i`: synchronize-service period in seconds; 0 disables.
    pub sweep_interval_secs: u64,
    /// `--count` / `-c`: `sweepCount` per tick per bucket; 0 disables the
    /// synchronize service.
    pub sweep_count: u32,
    /// `--bucket_max` / `-b`: `maxActivePerBucket`.
    pub max_active_per_bucket: usize,
    /// `--timeout` / `-t`: upload timeout in seconds.
    pub upload_timeout_secs: u64,
    /// `--fail_limit` / `-f`: attempts before a row is tombstoned.
    pub fail_limit: u32,
    /// `--ping_interval` / `-p`: reachability period in seconds; 0 disables (always up).
    pub ping_interval_secs: u64,
    /// `--aws_check_timeout` / `-a`: verify timeout in milliseconds; 0 disables verification.
    pub verify_timeout_ms: u64,
    /// `--database_cleanup_interval` / `-d`: ledger-maintenance period in
    /// seconds; 0 disables.
    pub clean_interval_secs: u64,
    /// `--sweep` / `-s`: sweep-once mode (ledger ignored).
    pub sweep_once: bool,
    /// `--verbosity` / `-v`: log floor.
    pub verbosity: Verbosity,
}

impl Config {
    /// Validates every field, accumulating all problems found rather than
    /// stopping at the first.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.root.is_absolute() {
            errors.push(ValidationError {
                field: "root".to_string(),
                message: format!("must be an absolute path, got {}", self.root.display()),
            });
        }
        if !self.root.is_dir() {
            errors.push(ValidationError {
                field: "root".to_string(),
                message: format!("must be an existing directory: {}", self.root.display()),
            });
        }
        if self.max_active_per_bucket == 0 {
            errors.push(ValidationError {
                field: "bucket_max".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.upload_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "timeout".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        if self.fail_limit == 0 {
            errors.push(ValidationError {
                field: "fail_limit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        errors
    }
}

/// Fluent builder for `Config`.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    root: PathBuf,
    sweep_interval_secs: u64,
    sweep_count: u32,
    max_active_per_bucket: usize,
    upload_timeout_secs: u64,
    fail_limit: u32,
    ping_interval_secs: u64,
    verify_timeout_ms: u64,
    clean_interval_secs: u64,
    sweep_once: bool,
    verbosity: Verbosity,
}

impl ConfigBuilder {
    /// Starts a new builder for the given watched root, with every other
    /// field set to its default.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            sweep_interval_secs: 10,
            sweep_count: 10,
            max_active_per_bucket: 10,
            upload_timeout_secs: 10,
            fail_limit: 10,
            ping_interval_secs: 10,
            verify_timeout_ms: 0,
            clean_interval_secs: 10,
            sweep_once: false,
            verbosity: Verbosity::Info,
        }
    }

    /// Sets the synchronize-service period.
    #[must_use]
    pub fn sweep_interval_secs(mut self, value: u64) -> Self {
        self.sweep_interval_secs = value;
        self
    }

    /// Sets `sweepCount`.
    #[must_use]
    pub fn sweep_count(mut self, value: u32) -> Self {
        self.sweep_count = value;
        self
    }

    /// Sets `maxActivePerBucket`.
    #[must_use]
    pub fn max_active_per_bucket(mut self, value: usize) -> Self {
        self.max_active_per_bucket = value;
        self
    }

    /// Sets the upload timeout in seconds.
    #[must_use]
    pub fn upload_timeout_secs(mut self, value: u64) -> Self {
        self.upload_timeout_secs = value;
        self
    }

    /// Sets `failLimit`.
    #[must_use]
    pub fn fail_limit(mut self, value: u32) -> Self {
        self.fail_limit = value;
        self
    }

    /// Sets the reachability-probe period in seconds.
    #[must_use]
    pub fn ping_interval_secs(mut self, value: u64) -> Self {
        self.ping_interval_secs = value;
        self
    }

    /// Sets the post-upload verification timeout in milliseconds.
    #[must_use]
    pub fn verify_timeout_ms(mut self, value: u64) -> Self {
        self.verify_timeout_ms = value;
        self
    }

    /// Sets the ledger-maintenance period in seconds.
    #[must_use]
    pub fn clean_interval_secs(mut self, value: u64) -> Self {
        self.clean_interval_secs = value;
        self
    }

    /// Sets sweep-once mode.
    #[must_use]
    pub fn sweep_once(mut self, value: bool) -> Self {
        self.sweep_once = value;
        self
    }

    /// Sets the log floor.
    #[must_use]
    pub fn verbosity(mut self, value: Verbosity) -> Self {
        self.verbosity = value;
        self
    }

    /// Builds the `Config` without validating it.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            root: self.root,
            sweep_interval_secs: self.sweep_interval_secs,
            sweep_count: self.sweep_count,
            max_active_per_bucket: self.max_active_per_bucket,
            upload_timeout_secs: self.upload_timeout_secs,
            fail_limit: self.fail_limit,
            ping_interval_secs: self.ping_interval_secs,
            verify_timeout_ms: self.verify_timeout_ms,
            clean_interval_secs: self.clean_interval_secs,
            sweep_once: self.sweep_once,
            verbosity: self.verbosity,
        }
    }

    /// Builds and validates the `Config`.
    ///
    /// # Errors
    /// Returns every accumulated `ValidationError` if any field is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}
