use thiserror::Error;

/// Recoverable and fatal conditions the pipeline can hit. Skip/bucket-only
/// conditions (an excluded URL, a QC validation failure) never become
/// exceptions here — they're logged or routed into a report directly.
/// Cancellation is carried out-of-band via
/// `tokio_util::sync::CancellationToken` rather than as an error variant.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("browser fetch not configured")]
    NotConfigured,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
