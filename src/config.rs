use std::path::PathBuf;
use std::time::Duration;

/// Database file used when nothing else is configured
pub const DEFAULT_DATABASE: &str = "tally.db";

/// Deadline for a single store interaction or unit of work
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

const DATABASE_ENV: &str = "TALLY_DATABASE";
const STORE_TIMEOUT_ENV: &str = "TALLY_STORE_TIMEOUT_MS";

/// Settings needed to open a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub database: PathBuf,
    pub store_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl LedgerConfig {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Build a config from `TALLY_DATABASE` and `TALLY_STORE_TIMEOUT_MS`,
    /// falling back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let database = std::env::var(DATABASE_ENV)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));

        let store_timeout = std::env::var(STORE_TIMEOUT_ENV)
            .ok()
            .and_then(|ms| parse_timeout_ms(&ms))
            .unwrap_or(DEFAULT_STORE_TIMEOUT);

        Self {
            database,
            store_timeout,
        }
    }
}

/// Parse a millisecond count. Zero is rejected: a zero deadline would fail
/// every store call.
pub fn parse_timeout_ms(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
    }
}
