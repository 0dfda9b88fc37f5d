//! Tracing subscriber setup: "YYYY-MM-DD HH:MM:SS [LEVEL] target: message".

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Local wall-clock timestamps in the same shape the operators' other tooling logs.
pub struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Filter directive for the requested verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "upsguard=debug,info"
    } else {
        "info"
    }
}

/// Initialize the global subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTimeFormatter)
        .with_target(true)
        .with_level(true)
        .init();
}
