use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DATA_DIR: &str = "./data/gtfs_subway";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid PORT env variable: {port}"))?,
            None => DEFAULT_PORT,
        };
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR env variable: {bind_addr}"))?;
        let data_dir = lookup("GTFS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self {
            port,
            bind_addr,
            data_dir,
        })
    }
}
