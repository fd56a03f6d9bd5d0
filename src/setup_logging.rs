use env_logger::Env;

/// Installs the process-wide logger. `RUST_LOG` overrides the default `info`
/// level.
pub fn setup_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}
