//! Crabwalk
//!
//! Finds the name servers that are really authoritative for a domain, so an ACME client can
//! check a [RFC-8555][RFC-8555] [DNS-01] challenge record the way the certificate authority
//! will see it instead of trusting a caching resolver.
//!
//! Start with [`AuthorityResolver::get_authority`]. It walks the delegation chain from the
//! registrable domain down to the requested name, keeps only name servers that actually
//! answer, and follows `CNAME` aliases to wherever validation really happens.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod authority;
pub mod config;
pub mod dns;
pub mod domain;
pub mod error;
pub mod validation;

#[cfg(test)]
mod testing;

pub use authority::{AuthorityResolver, LookupResult};
pub use config::{Config, Shared};
pub use dns::ResolverClient;
pub use domain::{DomainParser, SuffixList};
pub use validation::PropagationCheck;
