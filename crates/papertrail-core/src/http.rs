//! Blocking HTTP helpers over a shared async reqwest client.
//!
//! Requests run on a small shared tokio runtime and are wrapped in
//! `tokio::time::timeout`, so no network call can hang the harvest loop.
//! Callers see a sync interface.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use futures_util::StreamExt;

/// HTTP settings applied process-wide (config file defaults, CLI overrides)
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Upper bound for a whole request including the body read
    pub request_timeout: Duration,
    /// Retries for transient failures (429, 5xx, timeouts) within one request
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the global HTTP config. Must run before the first request;
/// later calls are ignored.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already initialized, ignoring override");
    }
}

/// Current global HTTP config (defaults if never set)
pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Error types for HTTP operations
#[derive(Debug)]
pub enum HttpError {
    /// Transport or status error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request exceeded the configured timeout
    Timeout(Duration),
    /// Response body exceeded the caller's byte cap
    TooLarge { limit: u64 },
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout(d) => write!(f, "request timed out after {}s", d.as_secs()),
            Self::TooLarge { limit } => write!(f, "response body exceeds {limit} bytes"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so API keys in query strings never reach the logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    /// Rate limits, server errors, timeouts and connection failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => match status {
                None => true,
                Some(429) => true,
                Some(s) => (500..=599).contains(s),
            },
            Self::Timeout(_) => true,
            Self::TooLarge { .. } => false,
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(http_config().connect_timeout)
        .pool_max_idle_per_host(4)
        .user_agent(concat!("papertrail/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// GET `url` with query pairs and extra headers, returning the body as text.
///
/// Non-2xx statuses are errors. The whole exchange is bounded by
/// `request_timeout`.
pub fn get_text(
    url: &str,
    query: &[(String, String)],
    headers: &[(&'static str, String)],
) -> Result<String, HttpError> {
    let timeout = http_config().request_timeout;
    SHARED_RUNTIME.handle().block_on(async {
        let exchange = async {
            let mut req = http_client().get(url).query(query);
            for (name, value) in headers {
                req = req.header(*name, value);
            }
            let resp = req
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(HttpError::from_reqwest)?;
            resp.text().await.map_err(HttpError::from_reqwest)
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout(timeout)),
        }
    })
}

/// GET `url` and collect the body, failing once more than `max_bytes` arrive.
pub fn get_bytes_capped(url: &str, max_bytes: u64) -> Result<Vec<u8>, HttpError> {
    let timeout = http_config().request_timeout;
    SHARED_RUNTIME.handle().block_on(async {
        let exchange = async {
            let resp = http_client()
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(HttpError::from_reqwest)?;

            if resp.content_length().is_some_and(|len| len > max_bytes) {
                return Err(HttpError::TooLarge { limit: max_bytes });
            }

            let mut body = Vec::new();
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(HttpError::from_reqwest)?;
                if (body.len() + chunk.len()) as u64 > max_bytes {
                    return Err(HttpError::TooLarge { limit: max_bytes });
                }
                body.extend_from_slice(&chunk);
            }
            Ok(body)
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout(timeout)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> HttpError {
        HttpError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_429_retryable() {
        assert!(http_err(429).is_retryable());
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(http_err(500).is_retryable());
        assert!(http_err(503).is_retryable());
    }

    #[test]
    fn http_4xx_not_retryable() {
        assert!(!http_err(400).is_retryable());
        assert!(!http_err(403).is_retryable());
        assert!(!http_err(404).is_retryable());
    }

    #[test]
    fn http_none_status_retryable() {
        // Connection refused / DNS failure carry no status
        let err = HttpError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_retryable_too_large_not() {
        assert!(HttpError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!HttpError::TooLarge { limit: 10 }.is_retryable());
    }

    #[test]
    fn display_variants() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
        let err = HttpError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
        assert_eq!(
            format!("{}", HttpError::Timeout(Duration::from_secs(60))),
            "request timed out after 60s"
        );
    }

    #[test]
    fn status_accessor() {
        assert_eq!(http_err(502).status(), Some(502));
        assert_eq!(HttpError::Timeout(Duration::from_secs(1)).status(), None);
    }
}
