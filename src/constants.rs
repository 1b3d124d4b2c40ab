use std::time::Duration;

/// Digest nonce count; every call re-authenticates so it is always the first use
pub(crate) const DIGEST_NONCE_COUNT: &str = "00000001";

/// Cluster-management state reported once a restart has settled
pub(crate) const CONTROL_PLANE_IDLE_STATE: &str = "IDLE";

/// Number of recent documents fetched by each workload read
pub(crate) const RECENT_DOCUMENT_LIMIT: i64 = 10;

/// Capacity of the outward event broadcast
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Overrides shorter than this are flagged as shorter than a typical election
pub(crate) const ELECTION_SAFE_TIMEOUT: Duration = Duration::from_secs(30);

/// Host reported when a test finishes without observing a primary
pub(crate) const UNKNOWN_PRIMARY: &str = "unknown";
