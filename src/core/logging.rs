//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// tilestream::core::logging::init();
/// log::info!("Streamer started");
/// ```
pub fn init() {
    init_with_filter("info");
}

/// Initialize logging with a custom default filter (e.g. `"tilestream=debug"`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_filter(filter: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter)
    ).try_init();
}
