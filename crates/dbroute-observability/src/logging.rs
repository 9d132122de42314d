//! Structured logging setup
//!
//! Installs a global `tracing` subscriber with an `EnvFilter`. `RUST_LOG`
//! directives, when present, are added on top of the configured level.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Map a configured level name to a tracing level (unknown names fall back to INFO)
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter for the given base level plus any `RUST_LOG` directives
pub fn build_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::new(parse_level(level).to_string());

    if let Ok(extra) = std::env::var("RUST_LOG") {
        for directive in extra.split(',').filter(|d| !d.trim().is_empty()) {
            match directive.trim().parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("Ignoring invalid RUST_LOG directive '{}': {}", directive, e),
            }
        }
    }

    filter
}

/// Install the global subscriber
///
/// `json` switches to newline-delimited JSON output.
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = build_filter(level);

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
