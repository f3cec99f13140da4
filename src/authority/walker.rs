use crate::authority::cache::{AuthorityCache, NameServers};
use crate::dns::{ClientPool, ResolverClient};
use crate::domain::{normalize, parent, DomainParser};
use crate::error::Error;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace, warn};

type WalkFuture<'a> = Pin<Box<dyn Future<Output = NameServers> + Send + 'a>>;

/// Finds the name servers that are authoritative for a domain by walking the delegation
/// chain down from its registrable domain.
///
/// Delegation for a subdomain is only trusted when it comes from the parent zone's own
/// servers: a caching resolver may hand out stale or rewritten `NS` data for the full name.
/// So the parent is resolved first and its first reachable server is asked about the child.
pub struct AuthorityWalker {
    parser: Arc<dyn DomainParser>,
    pool: Arc<ClientPool>,
    cache: AuthorityCache,
}

impl AuthorityWalker {
    pub fn new(parser: Arc<dyn DomainParser>, pool: Arc<ClientPool>) -> Self {
        AuthorityWalker {
            parser,
            pool,
            cache: AuthorityCache::default(),
        }
    }

    /// Verified name server addresses for `domain`, possibly empty. Never fails: an error is
    /// logged and stored as an empty set so it can't spill into other domains.
    pub fn resolve<'a>(&'a self, domain: &'a str) -> WalkFuture<'a> {
        Box::pin(async move {
            let domain = normalize(domain);
            if let Some(servers) = self.cache.get(&domain).await {
                return servers;
            }
            let servers = match self.walk(&domain).await {
                Ok(servers) => servers,
                Err(err) => {
                    warn!("unable to find name servers for {domain}: {err}");
                    NameServers::default()
                }
            };
            self.cache.insert_if_absent(&domain, servers).await
        })
    }

    /// The cached result for `domain`, if it has been resolved.
    pub async fn cached(&self, domain: &str) -> Option<NameServers> {
        self.cache.get(&normalize(domain)).await
    }

    async fn walk(&self, domain: &str) -> Result<NameServers, Error> {
        let registrable = self.parser.registrable_domain(domain)?;
        if domain == registrable {
            return self.walk_registrable(domain).await;
        }
        let parent_domain = match parent(domain) {
            Some(p) if domain.ends_with(&format!(".{registrable}")) => p,
            _ => return Err(Error::NoRegistrableDomain(domain.to_string())),
        };

        let inherited = self.resolve(parent_domain).await;
        let client = self.first_live(&inherited).await;
        let hosts = match client.name_servers(domain).await {
            Ok(hosts) => hosts,
            Err(err) => {
                warn!("{client} failed to list name servers for {domain}: {err}");
                return Ok(inherited);
            }
        };
        if hosts.is_empty() {
            trace!("{domain} has no delegation of its own, using {parent_domain}");
            return Ok(inherited);
        }

        let verified = self.verify(domain, &hosts).await;
        if verified.is_empty() {
            warn!("no name server of {domain} is reachable, using those of {parent_domain}");
            return Ok(inherited);
        }
        Ok(Arc::new(verified))
    }

    async fn walk_registrable(&self, domain: &str) -> Result<NameServers, Error> {
        let hosts = self.pool.system_client().name_servers(domain).await?;
        if hosts.is_empty() {
            debug!("no name servers found for {domain}");
            return Ok(NameServers::default());
        }
        let verified = self.verify(domain, &hosts).await;
        if verified.is_empty() {
            warn!("no name server of {domain} is reachable");
        }
        Ok(Arc::new(verified))
    }

    /// Resolve each name server host through the system client and keep the addresses that
    /// answer a liveness probe, in discovery order.
    async fn verify(&self, domain: &str, hosts: &[String]) -> Vec<IpAddr> {
        let system = self.pool.system_client();
        let mut candidates: Vec<IpAddr> = Vec::default();
        for host in hosts {
            match system.ips(host).await {
                Ok(ips) => {
                    for ip in ips {
                        if !candidates.contains(&ip) {
                            candidates.push(ip);
                        }
                    }
                }
                Err(err) => debug!("unable to resolve name server {host} of {domain}: {err}"),
            }
        }

        let mut probes = Vec::with_capacity(candidates.len());
        for ip in candidates {
            let client = self.pool.produce(ip).await;
            probes.push((ip, tokio::spawn(async move { client.connect().await })));
        }
        let mut verified = Vec::with_capacity(probes.len());
        for (ip, probe) in probes {
            if matches!(probe.await, Ok(true)) {
                verified.push(ip);
            }
        }
        debug!("{domain} has {} reachable name servers", verified.len());
        verified
    }

    /// The first reachable server of `servers`, or the system client if none is.
    async fn first_live(&self, servers: &[IpAddr]) -> Arc<ResolverClient> {
        for ip in servers {
            let client = self.pool.produce(*ip).await;
            if client.connect().await {
                return client;
            }
        }
        self.pool.system_client()
    }
}
