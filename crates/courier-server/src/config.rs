use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_DB_PATH: &str = "courier.db";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SYNC_PORT: u16 = 8080;
pub const DEFAULT_HTTP_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: IpAddr,
    pub sync_port: u16,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("COURIER_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let host = lookup("COURIER_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let host: IpAddr = host
            .parse()
            .with_context(|| format!("COURIER_HOST is not an IP address: {}", host))?;

        Ok(Self {
            db_path: db_path.into(),
            host,
            sync_port: port(&lookup, "COURIER_SYNC_PORT", DEFAULT_SYNC_PORT)?,
            http_port: port(&lookup, "COURIER_HTTP_PORT", DEFAULT_HTTP_PORT)?,
        })
    }

    pub fn sync_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.sync_port)
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.http_port)
    }
}

fn port(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> Result<u16> {
    match lookup(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} is not a valid port: {}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("courier.db"));
        assert_eq!(cfg.sync_addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.http_addr(), "127.0.0.1:3000".parse().unwrap());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("COURIER_DB_PATH", "/tmp/x.db"),
            ("COURIER_HOST", "0.0.0.0"),
            ("COURIER_SYNC_PORT", "9090"),
        ])
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.sync_addr(), "0.0.0.0:9090".parse().unwrap());
        assert_eq!(cfg.http_port, 3000);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(config(&[("COURIER_SYNC_PORT", "eighty")]).is_err());
        assert!(config(&[("COURIER_HTTP_PORT", "70000")]).is_err());
        assert!(config(&[("COURIER_HOST", "localhost:1")]).is_err());
    }
}
