use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a response was treated as a block rather than a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The final URL landed on the site's login or challenge path.
    ChallengeRedirect(String),
    /// The site answered with a status >= 400.
    Status(u16),
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::ChallengeRedirect(final_url) => {
                write!(f, "redirected to challenge page {}", final_url)
            }
            BlockReason::Status(code) => write!(f, "HTTP status {}", code),
        }
    }
}

/// Outcome of a single failed page fetch.
///
/// Blocks are reported separately from transport failures because the
/// orchestrator fails the whole run on the former and degrades on the latter.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Blocked fetching {url}: {reason}")]
    Blocked { url: String, reason: BlockReason },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No HTTP client for {url}: {reason}")]
    Client { url: String, reason: String },
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// A fatal fetch error means the session is compromised and the run must fail.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Blocked { .. })
    }

    /// Only plain transport failures are worth retrying with a fresh identity.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Blocked { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Transport { url, .. }
            | FetchError::Body { url, .. }
            | FetchError::Client { url, .. } => url,
        }
    }
}
