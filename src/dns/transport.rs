//! Network-backed [`Transport`] implementations.
//!
//! A [`BoundTransport`] talks plain UDP to exactly one name server, so the caller sees the raw
//! response including referrals in the authority section. A [`SystemTransport`] goes through a
//! full stub resolver configured with the operator's servers, or with the operating system's
//! configuration when none are given.
use crate::dns::client::{Answer, Transport};
use crate::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::debug;
use trust_dns_client::client::{AsyncClient, ClientHandle};
use trust_dns_client::op::ResponseCode;
use trust_dns_client::rr::{DNSClass, Name, RecordType};
use trust_dns_proto::udp::UdpClientStream;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

pub const DNS_PORT: u16 = 53;

/// Builds the transports behind the clients of a [`ClientPool`][crate::dns::pool::ClientPool].
pub trait Connector: Send + Sync {
    /// Transport for the system client. An empty `servers` list means the operating system's
    /// own resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolver can't be configured.
    fn system(&self, servers: &[IpAddr]) -> Result<Arc<dyn Transport>, Error>;

    /// Transport bound to a single name server.
    fn bound(&self, ip: IpAddr) -> Arc<dyn Transport>;
}

/// The [`Connector`] used outside of tests: UDP to port 53.
#[derive(Default, Debug, Clone, Copy)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    fn system(&self, servers: &[IpAddr]) -> Result<Arc<dyn Transport>, Error> {
        Ok(Arc::new(SystemTransport::new(servers)?))
    }

    fn bound(&self, ip: IpAddr) -> Arc<dyn Transport> {
        Arc::new(BoundTransport::new(SocketAddr::new(ip, DNS_PORT)))
    }
}

/// Queries one name server directly. The UDP client is created on the first query.
pub struct BoundTransport {
    addr: SocketAddr,
    client: OnceCell<AsyncClient>,
}

impl BoundTransport {
    pub fn new(addr: SocketAddr) -> Self {
        BoundTransport {
            addr,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<AsyncClient, Error> {
        let client = self
            .client
            .get_or_try_init(|| async move {
                let stream = UdpClientStream::<UdpSocket>::new(self.addr);
                let (client, background) = AsyncClient::connect(stream).await?;
                tokio::spawn(background);
                debug!("opened UDP client for {}", self.addr);
                Ok::<_, Error>(client)
            })
            .await?;
        Ok(client.clone())
    }
}

#[async_trait::async_trait]
impl Transport for BoundTransport {
    async fn query(&self, name: Name, record_type: RecordType) -> Result<Answer, Error> {
        let mut client = self.client().await?;
        let response = client.query(name, DNSClass::IN, record_type).await?;
        Ok(Answer {
            response_code: response.response_code(),
            answers: response.answers().to_vec(),
            authority: response.name_servers().to_vec(),
        })
    }
}

/// Queries through a stub resolver.
pub struct SystemTransport {
    resolver: TokioAsyncResolver,
}

impl SystemTransport {
    /// # Errors
    ///
    /// Returns [`Error::ResolveError`] if the system resolver configuration can't be read.
    pub fn new(servers: &[IpAddr]) -> Result<Self, Error> {
        let resolver = if servers.is_empty() {
            debug!("system client uses the operating system resolver configuration");
            TokioAsyncResolver::tokio_from_system_conf()?
        } else {
            debug!("system client uses {servers:?}");
            let group = NameServerConfigGroup::from_ips_clear(servers, DNS_PORT, true);
            TokioAsyncResolver::tokio(
                ResolverConfig::from_parts(None, vec![], group),
                ResolverOpts::default(),
            )?
        };
        Ok(SystemTransport { resolver })
    }
}

#[async_trait::async_trait]
impl Transport for SystemTransport {
    async fn query(&self, name: Name, record_type: RecordType) -> Result<Answer, Error> {
        match self.resolver.lookup(name, record_type).await {
            Ok(lookup) => Ok(Answer {
                response_code: ResponseCode::NoError,
                answers: lookup.records().to_vec(),
                authority: Vec::default(),
            }),
            // An empty answer is a normal response, not a failure.
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. } => Ok(Answer {
                    response_code: *response_code,
                    ..Answer::empty()
                }),
                _ => Err(err.into()),
            },
        }
    }
}
