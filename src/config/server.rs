use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Log to `<log_dir>/failover-tester.log` instead of stdout
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind_address.parse().map_err(|e| {
            Error::InvalidConfig(format!("server.bind_address {}: {}", self.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidConfig("server.port cannot be 0".into()));
        }
        self.socket_addr()?;
        Ok(())
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
