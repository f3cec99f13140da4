//! DNS query primitives.
//!
//! A [`ResolverClient`] sends `NS`, `A`/`AAAA`, `TXT` and `CNAME` queries to the server it is
//! bound to. Two bindings exist:
//!
//! * the **system** client, built once from
//!   [`Config::dns_servers`][`crate::config::Config::dns_servers`]. Literal IPs are used as
//!   given, host names are resolved once, and an empty list or the `"[System]"` token selects
//!   the operating system's resolver configuration.
//! * one client per **name server IP**, handed out by the [`ClientPool`] so repeated lookups
//!   against the same server share a single client and its cached liveness.
//!
//! Both bindings sit behind the [`Transport`] trait, which the authority walker never
//! inspects: it only chooses which client to ask.

pub mod client;
pub mod pool;
pub mod transport;

pub use client::{Answer, Identity, ResolverClient, Transport};
pub use pool::ClientPool;
pub use transport::{Connector, UdpConnector};
