//! Per-profile read/write load against the replica set under test

mod metrics;
mod runner;
pub use metrics::*;
pub use runner::*;

#[cfg(test)]
mod metrics_test;

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::ProfileName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Write,
    Read,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Write => "write",
            OperationKind::Read => "read",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempted operation; forwarded to subscribers unchanged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub profile: ProfileName,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub success: bool,
    /// Issuance to completion, in milliseconds
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    /// Milliseconds since the unix epoch at completion
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Writes only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sequence: Option<u64>,
}
