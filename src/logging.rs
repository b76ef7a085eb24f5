use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Safe to call more than once;
/// later calls return an error that callers typically discard with `.ok()`.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("init tracing subscriber: {e}"))
}
