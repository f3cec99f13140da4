//! Authoritative name server discovery for DNS-01 validation.
//!
//! A [DNS-01] challenge is checked by the certificate authority against the servers that are
//! authoritative for `_acme-challenge.<domain>`, not against whatever a caching resolver
//! happens to return. [`AuthorityResolver::get_authority`] finds those servers so a client
//! can look for its TXT record the same way the CA will.
//!
//! Discovery happens in two layers:
//!
//! 1. The [`AuthorityWalker`] walks the delegation chain from the registrable domain down to
//!    the requested name, asking each parent zone's own servers about the next label and
//!    keeping only servers that answer a liveness probe.
//! 2. The resolver then asks those servers whether the name is a `CNAME`. Validation of an
//!    aliased name happens wherever the alias points, so the target is resolved in turn and
//!    the results are chained through [`LookupResult::from`].
//!
//! Walk results and alias targets are cached for the lifetime of the resolver, which is
//! meant to live for a single renewal run.
//!
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

pub mod cache;
pub mod walker;

use crate::authority::cache::AliasCache;
use crate::config::Config;
use crate::dns::{ClientPool, Connector, Identity, ResolverClient, UdpConnector};
use crate::domain::{normalize, DomainParser, SuffixList};
use crate::error::Error;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub use walker::AuthorityWalker;

/// The name servers to ask about one domain, and the lookup it was reached from when the
/// domain is an alias target.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub domain: String,
    /// Most preferred first. Holds only the system client when no authoritative server could
    /// be found.
    pub nameservers: Vec<Arc<ResolverClient>>,
    pub from: Option<Box<LookupResult>>,
}

impl LookupResult {
    /// This result followed by every result it was derived from.
    pub fn chain(&self) -> impl Iterator<Item = &LookupResult> {
        std::iter::successors(Some(self), |r| r.from.as_deref())
    }

    /// True unless the lookup fell back to the system client.
    pub fn is_authoritative(&self) -> bool {
        self.nameservers
            .iter()
            .all(|c| c.identity() != Identity::System)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            domain: self.domain.clone(),
            nameservers: self.nameservers.iter().map(ToString::to_string).collect(),
            from: self.from.as_ref().map(|f| Box::new(f.summary())),
        }
    }
}

impl fmt::Display for LookupResult {
    /// Renders the chain from the original domain to this one, e.g.
    /// `a.example.com [10.0.0.1] -> b.example.net [10.1.0.1]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut links: Vec<&LookupResult> = self.chain().collect();
        links.reverse();
        for (i, link) in links.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            let servers: Vec<String> = link.nameservers.iter().map(ToString::to_string).collect();
            write!(f, "{} [{}]", link.domain, servers.join(", "))?;
        }
        Ok(())
    }
}

/// A serializable view of a [`LookupResult`] chain.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub domain: String,
    pub nameservers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Box<Summary>>,
}

/// Finds the authoritative name servers of domains, following `CNAME` aliases.
///
/// Cheap to clone: clones share the same caches and client pool. Separate instances share
/// nothing.
#[derive(Clone)]
pub struct AuthorityResolver {
    inner: Arc<Inner>,
}

struct Inner {
    pool: Arc<ClientPool>,
    walker: AuthorityWalker,
    aliases: AliasCache,
    max_alias_hops: usize,
}

impl AuthorityResolver {
    /// Create a resolver that talks to real name servers.
    ///
    /// # Errors
    ///
    /// Returns an error if the public suffix list can't be read or the system client can't
    /// be configured.
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let parser = match &config.public_suffix_list_path {
            Some(path) => SuffixList::try_from_file(path).await?,
            None => SuffixList::default(),
        };
        Self::with_connector(config, Arc::new(parser), Arc::new(UdpConnector)).await
    }

    /// Create a resolver with a custom registrable domain parser and network connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the system client can't be configured.
    pub async fn with_connector(
        config: &Config,
        parser: Arc<dyn DomainParser>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, Error> {
        let pool = Arc::new(ClientPool::new(config, connector).await?);
        Ok(AuthorityResolver {
            inner: Arc::new(Inner {
                walker: AuthorityWalker::new(parser, pool.clone()),
                pool,
                aliases: AliasCache::default(),
                max_alias_hops: config.max_alias_hops,
            }),
        })
    }

    pub fn system_client(&self) -> Arc<ResolverClient> {
        self.inner.pool.system_client()
    }

    pub fn walker(&self) -> &AuthorityWalker {
        &self.inner.walker
    }

    /// Find the name servers to ask about `domain`. With `follow_cnames`, an aliased domain
    /// yields the result for its target, linked back to the alias through
    /// [`LookupResult::from`].
    ///
    /// Alias following stops at a target already seen in the chain or after
    /// [`Config::max_alias_hops`] hops.
    pub async fn get_authority(&self, domain: &str, follow_cnames: bool) -> LookupResult {
        let mut domain = normalize(domain);
        let mut from = None;
        let mut visited = HashSet::new();
        loop {
            visited.insert(domain.clone());
            let result = self.lookup(&domain, from.take()).await;
            if !follow_cnames {
                return result;
            }
            let Some(target) = self.alias(&result).await else {
                return result;
            };
            if visited.contains(&target) {
                warn!("alias loop detected: {result} -> {target}");
                return result;
            }
            if visited.len() > self.inner.max_alias_hops {
                warn!("giving up on {result} -> {target}: too many aliases");
                return result;
            }
            domain = target;
            from = Some(Box::new(result));
        }
    }

    async fn lookup(&self, domain: &str, from: Option<Box<LookupResult>>) -> LookupResult {
        let servers = self.inner.walker.resolve(domain).await;
        let mut nameservers = Vec::with_capacity(servers.len().max(1));
        for ip in servers.iter() {
            nameservers.push(self.inner.pool.produce(*ip).await);
        }
        if nameservers.is_empty() {
            nameservers.push(self.system_client());
        }
        LookupResult {
            domain: domain.to_string(),
            nameservers,
            from,
        }
    }

    async fn alias(&self, result: &LookupResult) -> Option<String> {
        if let Some(target) = self.inner.aliases.get(&result.domain).await {
            return target;
        }
        let client = result
            .nameservers
            .first()
            .cloned()
            .unwrap_or_else(|| self.system_client());
        let target = match client.cname(&result.domain).await {
            Ok(Some(target)) => {
                debug!("{} is an alias of {target}", result.domain);
                Some(target)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("{client} failed to look up CNAME of {}: {err}", result.domain);
                None
            }
        };
        self.inner
            .aliases
            .insert_if_absent(&result.domain, target)
            .await
    }
}
