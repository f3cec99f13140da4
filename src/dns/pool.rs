use crate::config::Config;
use crate::dns::client::{Identity, ResolverClient};
use crate::dns::transport::{Connector, DNS_PORT};
use crate::error::Error;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Hands out one [`ResolverClient`] per name server address, plus the system client.
pub struct ClientPool {
    connector: Arc<dyn Connector>,
    system: Arc<ResolverClient>,
    clients: RwLock<HashMap<IpAddr, Arc<ResolverClient>>>,
}

impl ClientPool {
    /// Create a pool, resolving the configured DNS server list once.
    ///
    /// # Errors
    ///
    /// Returns an error if the system client's transport can't be built.
    pub async fn new(config: &Config, connector: Arc<dyn Connector>) -> Result<Self, Error> {
        let servers = system_servers(config).await;
        let system = ResolverClient::new(Identity::System, connector.system(&servers)?);
        Ok(ClientPool {
            connector,
            system: Arc::new(system),
            clients: RwLock::default(),
        })
    }

    /// The client bound to the operator's configured servers (or the OS default).
    pub fn system_client(&self) -> Arc<ResolverClient> {
        self.system.clone()
    }

    /// The pooled client for `ip`, created on first use.
    pub async fn produce(&self, ip: IpAddr) -> Arc<ResolverClient> {
        if let Some(client) = self.clients.read().await.get(&ip) {
            return client.clone();
        }
        let mut clients = self.clients.write().await;
        clients
            .entry(ip)
            .or_insert_with(|| {
                debug!("creating client for name server {ip}");
                Arc::new(ResolverClient::new(
                    Identity::Server(ip),
                    self.connector.bound(ip),
                ))
            })
            .clone()
    }
}

/// Turn the configured server list into addresses. Literal IPs are kept as they are and host
/// names are looked up once. An empty result means "use the operating system default".
async fn system_servers(config: &Config) -> Vec<IpAddr> {
    if config.uses_system_dns() {
        return Vec::default();
    }
    let mut servers = Vec::default();
    let mut seen = HashSet::new();
    for entry in &config.dns_servers {
        let entry = entry.trim();
        let ips = match entry.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => match tokio::net::lookup_host((entry, DNS_PORT)).await {
                Ok(addrs) => addrs.map(|a| a.ip()).collect(),
                Err(err) => {
                    warn!("unable to resolve DNS server \"{entry}\": {err}");
                    continue;
                }
            },
        };
        servers.extend(ips.into_iter().filter(|ip| seen.insert(*ip)));
    }
    if servers.is_empty() {
        warn!("no configured DNS server could be used, falling back to the system default");
    }
    servers
}
