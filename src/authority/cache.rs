use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Verified name server addresses for a domain, most preferred first. Empty means nothing
/// authoritative could be found for the domain.
pub type NameServers = Arc<Vec<IpAddr>>;

/// Authoritative name server addresses by domain.
pub type AuthorityCache = DomainCache<NameServers>;

/// `CNAME` target by domain. `None` records that the domain has no alias.
pub type AliasCache = DomainCache<Option<String>>;

/// A concurrent map from normalized domain to a value that never changes once stored.
///
/// Two tasks may race to compute the same entry. Both computations run, the first insert
/// wins and the loser receives the stored value, so readers only ever see one value per key.
#[derive(Debug)]
pub struct DomainCache<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Default for DomainCache<V> {
    fn default() -> Self {
        DomainCache {
            entries: RwLock::default(),
        }
    }
}

impl<V: Clone> DomainCache<V> {
    pub async fn get(&self, domain: &str) -> Option<V> {
        self.entries.read().await.get(domain).cloned()
    }

    /// Store `value` unless `domain` already has an entry, returning the stored value.
    pub async fn insert_if_absent(&self, domain: &str, value: V) -> V {
        let mut entries = self.entries.write().await;
        entries.entry(domain.to_string()).or_insert(value).clone()
    }
}
