//! Named database-client configurations under test.
//!
//! `resilient` and `fragile` are fixed; `custom` may be edited between runs
//! through [`ProfileRegistry::update_custom`]. A running test only ever sees
//! the [`ConnectionProfile`] copies taken by [`ProfileRegistry::snapshot`].


use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ELECTION_SAFE_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Resilient,
    Fragile,
    Custom,
}

impl ProfileName {
    pub const ALL: [ProfileName; 3] = [ProfileName::Resilient, ProfileName::Fragile, ProfileName::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Resilient => "resilient",
            ProfileName::Fragile => "fragile",
            ProfileName::Custom => "custom",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "resilient" => Ok(ProfileName::Resilient),
            "fragile" => Ok(ProfileName::Fragile),
            "custom" => Ok(ProfileName::Custom),
            other => Err(format!("unknown profile: {}", other)),
        }
    }
}

/// Driver settings of a profile. `None` means "use the driver default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(rename = "serverSelectionTimeoutMS", default)]
    pub server_selection_timeout_ms: Option<u64>,

    #[serde(rename = "socketTimeoutMS", default)]
    pub socket_timeout_ms: Option<u64>,

    #[serde(rename = "retryWrites", default)]
    pub retry_writes: Option<bool>,

    #[serde(rename = "retryReads", default)]
    pub retry_reads: Option<bool>,
}

impl ConnectionSettings {
    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_ms.map(Duration::from_millis)
    }

    pub fn socket_timeout(&self) -> Option<Duration> {
        self.socket_timeout_ms.map(Duration::from_millis)
    }

    pub fn has_overrides(&self) -> bool {
        self.server_selection_timeout_ms.is_some()
            || self.socket_timeout_ms.is_some()
            || self.retry_writes.is_some()
            || self.retry_reads.is_some()
    }

    /// Overrides rendered as connection-string options, e.g.
    /// `serverSelectionTimeoutMS=2000&retryWrites=false`. Empty when the
    /// driver defaults are used.
    pub fn uri_options(&self) -> String {
        let mut options = Vec::new();
        if let Some(ms) = self.server_selection_timeout_ms {
            options.push(format!("serverSelectionTimeoutMS={}", ms));
        }
        if let Some(ms) = self.socket_timeout_ms {
            options.push(format!("socketTimeoutMS={}", ms));
        }
        if let Some(retry) = self.retry_writes {
            options.push(format!("retryWrites={}", retry));
        }
        if let Some(retry) = self.retry_reads {
            options.push(format!("retryReads={}", retry));
        }
        options.join("&")
    }

    /// Overrides likely to turn an election into application errors
    pub fn warnings(&self) -> Vec<String> {
        let safe_ms = ELECTION_SAFE_TIMEOUT.as_millis() as u64;
        let mut warnings = Vec::new();
        if let Some(ms) = self.server_selection_timeout_ms.filter(|ms| *ms < safe_ms) {
            warnings.push(format!("serverSelectionTimeoutMS={} is shorter than a typical election", ms));
        }
        if let Some(ms) = self.socket_timeout_ms.filter(|ms| *ms > 0 && *ms < safe_ms) {
            warnings.push(format!("socketTimeoutMS={} is shorter than a typical election", ms));
        }
        if self.retry_writes == Some(false) {
            warnings.push("retryWrites disabled".to_string());
        }
        if self.retry_reads == Some(false) {
            warnings.push("retryReads disabled".to_string());
        }
        warnings
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub name: ProfileName,
    pub display_name: String,
    pub description: String,
    pub settings: ConnectionSettings,
    /// Connection-string options equivalent to `settings`
    pub example: String,
    pub warnings: Vec<String>,
}

impl ConnectionProfile {
    fn new(
        name: ProfileName,
        settings: ConnectionSettings,
    ) -> Self {
        let (display_name, description) = match name {
            ProfileName::Resilient => (
                "Resilient (Driver Defaults)",
                "No special configuration - just use the driver defaults",
            ),
            ProfileName::Fragile => (
                "Fragile (Bad Overrides)",
                "Short timeouts + disabled retries - common misconfiguration",
            ),
            ProfileName::Custom => ("Custom Configuration", "Experiment with different settings"),
        };
        let example = if settings.has_overrides() {
            format!("?{}", settings.uri_options())
        } else {
            "(driver defaults, no options)".to_string()
        };
        Self {
            name,
            display_name: display_name.to_string(),
            description: description.to_string(),
            warnings: settings.warnings(),
            example,
            settings,
        }
    }
}

/// Settings of the `fragile` profile: timeouts well below an election and
/// no automatic retries
pub fn fragile_settings() -> ConnectionSettings {
    ConnectionSettings {
        server_selection_timeout_ms: Some(2000),
        socket_timeout_ms: Some(2000),
        retry_writes: Some(false),
        retry_reads: Some(false),
    }
}

/// Owner of the profile declarations; only `custom` is mutable
pub struct ProfileRegistry {
    custom: ArcSwap<ConnectionSettings>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self {
            custom: ArcSwap::from_pointee(ConnectionSettings::default()),
        }
    }

    pub fn get(
        &self,
        name: ProfileName,
    ) -> ConnectionProfile {
        let settings = match name {
            ProfileName::Resilient => ConnectionSettings::default(),
            ProfileName::Fragile => fragile_settings(),
            ProfileName::Custom => self.custom.load().as_ref().clone(),
        };
        ConnectionProfile::new(name, settings)
    }

    pub fn list(&self) -> Vec<ConnectionProfile> {
        ProfileName::ALL.iter().map(|name| self.get(*name)).collect()
    }

    /// Replace the `custom` settings. Tests already running keep the copy
    /// they took at start.
    pub fn update_custom(
        &self,
        settings: ConnectionSettings,
    ) -> ConnectionProfile {
        self.custom.store(std::sync::Arc::new(settings));
        self.get(ProfileName::Custom)
    }

    /// Frozen copies of the requested profiles, duplicates collapsed,
    /// request order kept
    pub fn snapshot(
        &self,
        names: &[ProfileName],
    ) -> Vec<ConnectionProfile> {
        let mut seen = Vec::with_capacity(names.len());
        for name in names {
            if !seen.contains(name) {
                seen.push(*name);
            }
        }
        seen.into_iter().map(|name| self.get(name)).collect()
    }
}
