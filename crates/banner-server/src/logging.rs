//! Process-wide tracing subscriber.
//!
//! The subscriber starts at `info` before configuration is read. Once the
//! config is loaded, `logging.level` replaces the filter in place. A non-empty
//! `RUST_LOG` pins the filter for the lifetime of the process.

use std::sync::OnceLock;

use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const STARTUP_LEVEL: &str = "info";

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn rust_log() -> Option<String> {
    std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty())
}

/// `rust_log` wins when it holds valid directives.
fn filter_for(level: &str, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let initial = filter_for(STARTUP_LEVEL, rust_log().as_deref());
    let (filter, handle) = reload::Layer::new(initial);
    if FILTER.set(handle).is_err() {
        return;
    }

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
    {
        eprintln!("Warning: tracing subscriber not installed: {e}");
    }
}

/// Swaps in the configured level.
///
/// Returns `false` if `RUST_LOG` pins the filter or no subscriber is installed.
pub fn set_level(level: &str) -> bool {
    if rust_log().is_some() {
        return false;
    }
    let Some(handle) = FILTER.get() else {
        return false;
    };
    match handle.reload(filter_for(level, None)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, level, "Failed to apply log level");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_used_without_rust_log() {
        assert_eq!(filter_for("debug", None).to_string(), "debug");
    }

    #[test]
    fn rust_log_directives_take_precedence() {
        let filter = filter_for("info", Some("banner_server=trace"));
        assert_eq!(filter.to_string(), "banner_server=trace");
    }

    #[test]
    fn unparseable_rust_log_falls_back_to_level() {
        assert_eq!(filter_for("warn", Some("banner=loud")).to_string(), "warn");
    }

    #[test]
    fn set_level_without_subscriber_is_rejected() {
        assert!(!set_level("debug"));
    }
}
