use crate::error::Error;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type Shared = Arc<Config>;

/// Sentinel [`Config::dns_servers`] entry that selects the operating system's resolver.
pub const SYSTEM_DNS_TOKEN: &str = "[System]";

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// DNS servers used by the system client: IP literals, hostnames or [`SYSTEM_DNS_TOKEN`].
    pub dns_servers: Vec<String>,
    /// Path to a `public_suffix_list.dat` file. Without it only the implicit `*` rule applies.
    pub public_suffix_list_path: Option<String>,
    pub max_alias_hops: usize,
    pub pre_validate_retry_count: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub pre_validate_retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dns_servers: Vec::default(),
            public_suffix_list_path: None,
            max_alias_hops: 8,
            pre_validate_retry_count: 5,
            pre_validate_retry_delay: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        Ok(conf)
    }

    /// True when the configured server list asks for the operating system's resolver, either
    /// explicitly through [`SYSTEM_DNS_TOKEN`] or by listing nothing.
    pub fn uses_system_dns(&self) -> bool {
        self.dns_servers.is_empty()
            || self
                .dns_servers
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(SYSTEM_DNS_TOKEN))
    }
}
