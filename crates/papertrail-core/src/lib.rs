//! Papertrail Core - shared infrastructure for the harvest and index pipelines
//!
//! Bounded-timeout HTTP, retry backoff, crash-safe file writes, logging,
//! cooperative shutdown and progress reporting.

pub mod durable;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use durable::{LockedAppender, cleanup_tmp_file, write_atomic};
pub use http::{
    HttpConfig, HttpError, SHARED_RUNTIME, get_bytes_capped, get_text, http_client, http_config,
    set_http_config,
};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, Summary, fmt_num};
pub use retry::{backoff_duration, retry_with_backoff};
pub use shutdown::{install_signal_handlers, shutdown_flag};
