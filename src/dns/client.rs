use crate::domain::{normalize, to_fqdn};
use crate::error::Error;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace};
use trust_dns_client::op::ResponseCode;
use trust_dns_client::rr::{Name, RData, Record, RecordType};

/// Host queried by the liveness probe. Any answer, including `NXDOMAIN`, counts as alive.
pub const PROBE_HOST: &str = "example.com";

/// The sections of a DNS response that name server discovery cares about.
#[derive(Debug, Clone)]
pub struct Answer {
    pub response_code: ResponseCode,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
}

impl Answer {
    /// An empty `NOERROR` response.
    pub fn empty() -> Self {
        Answer {
            response_code: ResponseCode::NoError,
            answers: Vec::default(),
            authority: Vec::default(),
        }
    }
}

/// Sends a single query to whichever server(s) a [`ResolverClient`] is bound to.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn query(&self, name: Name, record_type: RecordType) -> Result<Answer, Error>;
}

/// Which server a [`ResolverClient`] sends its queries to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// The operator's configured servers, or the operating system default.
    System,
    /// One explicit name server.
    Server(IpAddr),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::System => write!(f, "[System]"),
            Identity::Server(ip) => write!(f, "{ip}"),
        }
    }
}

/// A DNS query primitive bound to one server identity.
///
/// Reachability is probed once per client with [`ResolverClient::connect`] and remembered for
/// the lifetime of the client.
pub struct ResolverClient {
    identity: Identity,
    transport: Arc<dyn Transport>,
    reachable: OnceCell<bool>,
}

impl fmt::Debug for ResolverClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverClient")
            .field("identity", &self.identity)
            .field("reachable", &self.reachable.get())
            .finish()
    }
}

impl fmt::Display for ResolverClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identity.fmt(f)
    }
}

impl ResolverClient {
    pub fn new(identity: Identity, transport: Arc<dyn Transport>) -> Self {
        ResolverClient {
            identity,
            transport,
            reachable: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// The bound server address, or `None` for the system client.
    pub fn ip_address(&self) -> Option<IpAddr> {
        match self.identity {
            Identity::System => None,
            Identity::Server(ip) => Some(ip),
        }
    }

    /// Cached reachability, `None` while the probe hasn't run yet.
    pub fn reachable(&self) -> Option<bool> {
        self.reachable.get().copied()
    }

    /// Probe whether the server answers queries at all. Computed once per client.
    pub async fn connect(&self) -> bool {
        *self
            .reachable
            .get_or_init(|| async move {
                let name = match to_fqdn(PROBE_HOST) {
                    Ok(name) => name,
                    Err(_) => return false,
                };
                match self.transport.query(name, RecordType::TXT).await {
                    Ok(_) => true,
                    Err(err) => {
                        debug!("name server {} is unreachable: {err}", self.identity);
                        false
                    }
                }
            })
            .await
    }

    /// Host names of the name servers for `domain`. Falls back to the authority section when
    /// the answer section holds no `NS` records, which is what a referral looks like.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the server answers with an error code.
    pub async fn name_servers(&self, domain: &str) -> Result<Vec<String>, Error> {
        let answer = self.query(domain, RecordType::NS).await?;
        let mut hosts = ns_hosts(&answer.answers);
        if hosts.is_empty() {
            hosts = ns_hosts(&answer.authority);
        }
        trace!("{} lists {} name servers for {domain}", self.identity, hosts.len());
        Ok(hosts)
    }

    /// Every TXT value at `host`, with the character strings of each record concatenated.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the server answers with an error code.
    pub async fn txt_records(&self, host: &str) -> Result<Vec<String>, Error> {
        let answer = self.query(host, RecordType::TXT).await?;
        Ok(answer
            .answers
            .iter()
            .filter_map(|r| match r.data() {
                Some(RData::TXT(txt)) => Some(
                    txt.txt_data()
                        .iter()
                        .map(|part| String::from_utf8_lossy(part))
                        .collect::<String>(),
                ),
                _ => None,
            })
            .collect())
    }

    /// The `A` and `AAAA` addresses of `host`, IPv4 first. A failed lookup of one type still
    /// returns the addresses of the other.
    ///
    /// # Errors
    ///
    /// Returns the `AAAA` error if both queries fail.
    pub async fn ips(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        const RECORD_TYPES: [RecordType; 2] = [RecordType::A, RecordType::AAAA];
        let mut ips = Vec::default();
        let mut failures = Vec::with_capacity(RECORD_TYPES.len());
        for record_type in RECORD_TYPES {
            match self.query(host, record_type).await {
                Ok(answer) => ips.extend(answer.answers.iter().filter_map(|r| match r.data() {
                    Some(RData::A(v4)) => Some(IpAddr::V4(*v4)),
                    Some(RData::AAAA(v6)) => Some(IpAddr::V6(*v6)),
                    _ => None,
                })),
                Err(err) => {
                    debug!("{} failed to look up {record_type} {host}: {err}", self.identity);
                    failures.push(err);
                }
            }
        }
        match failures.pop() {
            Some(err) if failures.len() + 1 == RECORD_TYPES.len() => Err(err),
            _ => Ok(ips),
        }
    }

    /// The `CNAME` target of `host`, normalized, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the server answers with an error code.
    pub async fn cname(&self, host: &str) -> Result<Option<String>, Error> {
        let answer = self.query(host, RecordType::CNAME).await?;
        Ok(answer.answers.iter().find_map(|r| match r.data() {
            Some(RData::CNAME(target)) => Some(normalize(&target.to_ascii())),
            _ => None,
        }))
    }

    async fn query(&self, host: &str, record_type: RecordType) -> Result<Answer, Error> {
        let host = normalize(host);
        trace!("querying {} for {record_type} {host}", self.identity);
        let answer = self.transport.query(to_fqdn(&host)?, record_type).await?;
        match answer.response_code {
            ResponseCode::NoError | ResponseCode::NXDomain => Ok(answer),
            code => Err(Error::UnexpectedResponse {
                server: self.identity.to_string(),
                name: host,
                code,
            }),
        }
    }
}

fn ns_hosts(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            Some(RData::NS(ns)) => Some(normalize(&ns.to_ascii())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ns_record, txt_record, FakeNetwork};
    use std::net::Ipv4Addr;

    const SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    #[tokio::test]
    async fn name_servers_fall_back_to_authority_section() {
        let net = FakeNetwork::default();
        net.referral(
            Some(SERVER),
            "sub.example.com",
            vec![ns_record("sub.example.com", "ns1.sub.example.com.")],
        );
        let client = net.client(Identity::Server(SERVER));
        let hosts = client.name_servers("sub.example.com").await.unwrap();
        assert_eq!(hosts, vec!["ns1.sub.example.com".to_string()]);
    }

    #[tokio::test]
    async fn txt_values_join_character_strings() {
        let net = FakeNetwork::default();
        net.answer(
            None,
            "_acme-challenge.example.com",
            RecordType::TXT,
            vec![txt_record("_acme-challenge.example.com", &["abc", "def"])],
        );
        let client = net.client(Identity::System);
        let txt = client
            .txt_records("_acme-challenge.example.com")
            .await
            .unwrap();
        assert_eq!(txt, vec!["abcdef".to_string()]);
    }

    #[tokio::test]
    async fn liveness_is_probed_once() {
        let net = FakeNetwork::default();
        net.unreachable(SERVER);
        let client = net.client(Identity::Server(SERVER));
        assert_eq!(client.reachable(), None);
        assert!(!client.connect().await);
        assert!(!client.connect().await);
        assert_eq!(client.reachable(), Some(false));
        assert_eq!(net.count(Some(SERVER), PROBE_HOST, RecordType::TXT), 1);
    }

    #[tokio::test]
    async fn addresses_survive_one_failed_record_type() {
        let net = FakeNetwork::default();
        net.address("ns1.example.com", SERVER);
        net.type_response_code(None, "ns1.example.com", RecordType::AAAA, ResponseCode::ServFail);
        let client = net.client(Identity::System);
        assert_eq!(client.ips("ns1.example.com").await.unwrap(), vec![SERVER]);

        net.type_response_code(None, "ns1.example.com", RecordType::A, ResponseCode::ServFail);
        assert!(matches!(
            client.ips("ns1.example.com").await,
            Err(Error::UnexpectedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn nxdomain_is_reachable_but_servfail_is_an_error() {
        let net = FakeNetwork::default();
        net.response_code(Some(SERVER), PROBE_HOST, ResponseCode::NXDomain);
        net.response_code(Some(SERVER), "broken.example.com", ResponseCode::ServFail);
        let client = net.client(Identity::Server(SERVER));
        assert!(client.connect().await);
        assert!(matches!(
            client.cname("broken.example.com").await,
            Err(Error::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn system_identity_displays_as_sentinel() {
        assert_eq!(Identity::System.to_string(), "[System]");
        assert_eq!(Identity::Server(SERVER).to_string(), "10.0.0.1");
    }
}
