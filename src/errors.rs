//! Failover Tester Error Hierarchy
//!
//! Errors are grouped by the collaborator that produced them. Expected
//! failures (a missed poll, a single failed operation) are converted into
//! events and metrics by their component and never surface here; what does
//! surface invalidates the premise of a test run.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings could not be loaded or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings loaded but failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Cluster-management API failures
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    /// Database driver and topology failures
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Test lifecycle misuse
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Digest challenge/response failures
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Non-2xx response other than the initial challenge
    #[error("Control plane API error: {status} - {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failures
    #[error("Control plane request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body was not the expected JSON document
    #[error("Invalid control plane response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Cluster never reported idle while polling
    #[error("Cluster did not become healthy within {0:?}")]
    HealthyTimeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No WWW-Authenticate header received")]
    MissingChallenge,

    #[error("Malformed digest challenge: {0}")]
    MalformedChallenge(String),

    #[error("Unsupported digest qop: {0}")]
    UnsupportedQop(String),

    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Credentials were refused on the authenticated retry
    #[error("Digest credentials rejected: {body}")]
    Rejected { body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// No server could serve the operation (no primary, unreachable node)
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    /// Client-side socket timeout elapsed
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// replSetGetStatus reply missing expected fields
    #[error("Malformed replica set status: {0}")]
    MalformedStatus(String),
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Test already running")]
    AlreadyRunning,

    #[error("At least one profile is required to start a test")]
    NoProfiles,

    /// Per-run overrides that cannot drive a timer
    #[error("Invalid test request: {0}")]
    InvalidRequest(String),
}

// ============== Conversion Implementations ============== //
impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::ControlPlane(ControlPlaneError::Auth(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ControlPlane(ControlPlaneError::Transport(e))
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        Error::Database(DatabaseError::Driver(e))
    }
}
