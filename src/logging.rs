use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Set up the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the configured level; `--verbose` forces debug.
pub fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(DEFAULT_FILTER)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
