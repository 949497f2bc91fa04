use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Install the global subscriber: fmt output on stderr, filtered by
/// `RUST_LOG` or `default_filter` when it is unset.
///
/// Stdout is reserved for command output.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

/// Load `.env` from the working directory if there is one.
pub fn load_dotenv() {
    let _ = dotenv::dotenv();
}
