//! A scripted, call-counting DNS network for unit tests.

use crate::dns::client::{Answer, Identity, ResolverClient, Transport};
use crate::dns::transport::Connector;
use crate::domain::normalize;
use crate::error::Error;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use trust_dns_client::op::ResponseCode;
use trust_dns_client::rr::rdata::TXT;
use trust_dns_client::rr::{Name, RData, Record, RecordType};
use trust_dns_proto::error::ProtoError;

/// `None` is the system client, `Some(ip)` a bound name server.
pub type Server = Option<IpAddr>;
type Key = (Server, String, RecordType);

#[derive(Default)]
struct State {
    answers: HashMap<Key, Answer>,
    codes: HashMap<(Server, String), ResponseCode>,
    type_codes: HashMap<Key, ResponseCode>,
    unreachable: HashSet<IpAddr>,
    failing: HashSet<String>,
    counts: HashMap<Key, usize>,
    system_servers: Option<Vec<IpAddr>>,
}

#[derive(Default, Clone)]
pub struct FakeNetwork {
    state: Arc<Mutex<State>>,
}

impl FakeNetwork {
    pub fn answer(&self, server: Server, name: &str, record_type: RecordType, records: Vec<Record>) {
        let mut state = self.state.lock().unwrap();
        let answer = state
            .answers
            .entry((server, normalize(name), record_type))
            .or_insert_with(Answer::empty);
        answer.answers.extend(records);
    }

    /// An `NS` response with the records in the authority section only.
    pub fn referral(&self, server: Server, name: &str, records: Vec<Record>) {
        let mut state = self.state.lock().unwrap();
        let answer = state
            .answers
            .entry((server, normalize(name), RecordType::NS))
            .or_insert_with(Answer::empty);
        answer.authority.extend(records);
    }

    /// Make `server` list `hosts` as the name servers of `domain`, and make the system client
    /// resolve each host to its address.
    pub fn delegate(&self, server: Server, domain: &str, hosts: &[(&str, IpAddr)]) {
        let records = hosts
            .iter()
            .map(|(host, _)| ns_record(domain, &format!("{host}.")))
            .collect();
        self.answer(server, domain, RecordType::NS, records);
        for (host, ip) in hosts {
            self.address(host, *ip);
        }
    }

    pub fn address(&self, host: &str, ip: IpAddr) {
        let record_type = match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::AAAA,
        };
        self.answer(None, host, record_type, vec![a_record(host, ip)]);
    }

    pub fn alias(&self, server: Server, name: &str, target: &str) {
        self.answer(
            server,
            name,
            RecordType::CNAME,
            vec![cname_record(name, &format!("{target}."))],
        );
    }

    pub fn response_code(&self, server: Server, name: &str, code: ResponseCode) {
        let mut state = self.state.lock().unwrap();
        state.codes.insert((server, normalize(name)), code);
    }

    /// Like [`FakeNetwork::response_code`], for a single record type.
    pub fn type_response_code(
        &self,
        server: Server,
        name: &str,
        record_type: RecordType,
        code: ResponseCode,
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .type_codes
            .insert((server, normalize(name), record_type), code);
    }

    pub fn unreachable(&self, ip: IpAddr) {
        self.state.lock().unwrap().unreachable.insert(ip);
    }

    /// Every query for `name`, on any server, fails.
    pub fn failing(&self, name: &str) {
        self.state.lock().unwrap().failing.insert(normalize(name));
    }

    pub fn count(&self, server: Server, name: &str, record_type: RecordType) -> usize {
        let state = self.state.lock().unwrap();
        state
            .counts
            .get(&(server, normalize(name), record_type))
            .copied()
            .unwrap_or_default()
    }

    /// Number of queries for `name` across all servers and types.
    pub fn count_name(&self, name: &str) -> usize {
        let name = normalize(name);
        let state = self.state.lock().unwrap();
        state
            .counts
            .iter()
            .filter(|((_, n, _), _)| *n == name)
            .map(|(_, c)| c)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.state.lock().unwrap().counts.values().sum()
    }

    /// The server list the system transport was built with, if it was built.
    pub fn system_servers(&self) -> Option<Vec<IpAddr>> {
        self.state.lock().unwrap().system_servers.clone()
    }

    pub fn client(&self, identity: Identity) -> Arc<ResolverClient> {
        let server = match identity {
            Identity::System => None,
            Identity::Server(ip) => Some(ip),
        };
        Arc::new(ResolverClient::new(identity, self.transport(server)))
    }

    fn transport(&self, server: Server) -> Arc<dyn Transport> {
        Arc::new(FakeTransport {
            server,
            state: self.state.clone(),
        })
    }
}

impl Connector for FakeNetwork {
    fn system(&self, servers: &[IpAddr]) -> Result<Arc<dyn Transport>, Error> {
        self.state.lock().unwrap().system_servers = Some(servers.to_vec());
        Ok(self.transport(None))
    }

    fn bound(&self, ip: IpAddr) -> Arc<dyn Transport> {
        self.transport(Some(ip))
    }
}

struct FakeTransport {
    server: Server,
    state: Arc<Mutex<State>>,
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn query(&self, name: Name, record_type: RecordType) -> Result<Answer, Error> {
        let name = normalize(&name.to_ascii());
        let mut state = self.state.lock().unwrap();
        *state
            .counts
            .entry((self.server, name.clone(), record_type))
            .or_default() += 1;
        if let Some(ip) = self.server {
            if state.unreachable.contains(&ip) {
                return Err(ProtoError::from("request timed out").into());
            }
        }
        if state.failing.contains(&name) {
            return Err(ProtoError::from("connection reset").into());
        }
        let mut answer = state
            .answers
            .get(&(self.server, name.clone(), record_type))
            .cloned()
            .unwrap_or_else(Answer::empty);
        if let Some(code) = state.type_codes.get(&(self.server, name.clone(), record_type)) {
            answer.response_code = *code;
        } else if let Some(code) = state.codes.get(&(self.server, name)) {
            answer.response_code = *code;
        }
        Ok(answer)
    }
}

fn record(name: &str, rdata: RData) -> Record {
    Record::from_rdata(Name::from_str(&format!("{}.", normalize(name))).unwrap(), 60, rdata)
}

pub fn ns_record(name: &str, target: &str) -> Record {
    record(name, RData::NS(Name::from_str(target).unwrap()))
}

pub fn cname_record(name: &str, target: &str) -> Record {
    record(name, RData::CNAME(Name::from_str(target).unwrap()))
}

pub fn a_record(name: &str, ip: IpAddr) -> Record {
    match ip {
        IpAddr::V4(v4) => record(name, RData::A(v4)),
        IpAddr::V6(v6) => record(name, RData::AAAA(v6)),
    }
}

pub fn txt_record(name: &str, parts: &[&str]) -> Record {
    record(
        name,
        RData::TXT(TXT::new(parts.iter().map(ToString::to_string).collect())),
    )
}
