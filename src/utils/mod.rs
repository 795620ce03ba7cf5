use std::{env, path::PathBuf, sync::Once};

use circle_config::Config;

static TRACING_INIT: Once = Once::new();

/// Environment variable that relocates configuration and circle data.
pub const HOME_ENV: &str = "CIRCLE_LEDGER_HOME";

/// Filter used when `RUST_LOG` is unset: warnings everywhere, lifecycle events from the
/// ledger crates.
const DEFAULT_DIRECTIVES: &str = "warn,circle_ledger=info,circle_core=info,circle_storage_json=info";

/// Initializes the global tracing subscriber with sensible defaults.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::fmt;

        let rust_log = env::var("RUST_LOG").ok();
        // stdout carries command output only.
        let _ = fmt()
            .with_env_filter(log_filter(rust_log.as_deref()))
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Builds the filter from a `RUST_LOG` value, falling back to [`DEFAULT_DIRECTIVES`].
fn log_filter(rust_log: Option<&str>) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::{filter::LevelFilter, EnvFilter};

    let directives = rust_log
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES);
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives)
}

/// Returns the application home, `$CIRCLE_LEDGER_HOME` or `~/.circle_ledger`.
pub fn app_data_dir() -> PathBuf {
    match env::var_os(HOME_ENV) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => Config::default_home(),
    }
}
