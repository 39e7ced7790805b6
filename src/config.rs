use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "ScopeGuard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/ScopeGuard/ on all platforms; falls back to ./ScopeGuard when no home
/// directory can be determined (containers, service accounts).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Directory holding the reference tables (vocabulary, keywords, weights, costs)
pub fn config_dir() -> PathBuf {
    app_data_dir().join("config")
}

/// Default location of the approved-baseline database
pub fn baseline_db_path() -> PathBuf {
    app_data_dir().join("baseline.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,scopeguard_lib=debug"
    } else {
        "info"
    }
}
