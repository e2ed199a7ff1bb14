//! Structured logging sink.
//!
//! A custom `tracing_subscriber::fmt::format::FormatEvent` producing exactly
//! `<UTC timestamp> | <level, 11-wide> | <message>` — this daemon's log line
//! shape is a fixed external contract that downstream log shippers parse.

use std::fmt;

use bucketsync_core::config::Verbosity;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Renders one line per event: `<UTC timestamp> | <level, 11-wide> | <message>`.
pub struct PlainFormatter;

impl<S, N> FormatEvent<S, N> for PlainFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let level = event.metadata().level().to_string().to_uppercase();
        write!(writer, "{timestamp} | {level:<11} | ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Converts a [`Verbosity`] floor into the `tracing` level it gates at.
fn level_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Critical | Verbosity::Error => "error",
        Verbosity::Warn => "warn",
        Verbosity::Info => "info",
    }
}

/// Installs the global subscriber at the configured floor. Called once from
/// `main` at startup, before any other component logs.
pub fn install(verbosity: Verbosity) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_filter(verbosity)));

    tracing_subscriber::fmt()
        .event_format(PlainFormatter)
        .with_env_filter(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_matches_verbosity_floor() {
        assert_eq!(level_filter(Verbosity::Critical), "error");
        assert_eq!(level_filter(Verbosity::Error), "error");
        assert_eq!(level_filter(Verbosity::Warn), "warn");
        assert_eq!(level_filter(Verbosity::Info), "info");
    }
}
