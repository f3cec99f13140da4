//! Error types.

use trust_dns_client::error::ClientError;
use trust_dns_client::op::ResponseCode;
use trust_dns_proto::error::ProtoError;
use trust_dns_resolver::error::ResolveError;

/// Error enumerates the possible Crabwalk error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a query sent to an explicit name server fails at the protocol level,
    /// e.g. the server could not be reached or the query timed out.
    #[error("DNS error: {0}")]
    DNSError(#[from] ProtoError),

    /// Returned when a query sent through the UDP client of an explicit name server fails,
    /// e.g. because the server timed out or sent back a malformed message.
    #[error("DNS client error: {0}")]
    ClientError(#[from] ClientError),

    /// Returned when a query sent through the system resolver fails for a reason other than
    /// the name simply having no records of the requested type.
    #[error("system resolver error: {0}")]
    ResolveError(#[from] ResolveError),

    /// Returned when a name server answers with a response code that carries no usable
    /// answer, e.g. `SERVFAIL` or `REFUSED`.
    #[error("{server} answered {code} for \"{name}\"")]
    UnexpectedResponse {
        server: String,
        name: String,
        code: ResponseCode,
    },

    /// Returned when a string can't be turned into a DNS name.
    #[error("invalid domain name: \"{0}\"")]
    InvalidName(String),

    /// Returned by a [`DomainParser`][`crate::domain::DomainParser`] when a name has no
    /// registrable domain, e.g. because it is itself a public suffix.
    #[error("no registrable domain for \"{0}\"")]
    NoRegistrableDomain(String),

    /// Returned when an expected TXT value isn't a valid [RFC-8555][RFC-8555] [DNS-01]
    /// challenge response value.
    ///
    /// These values MUST be a BASE64 encoded 32 byte SHA256 digest.
    ///
    /// [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
    /// [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
    #[error("TXT value is not a valid DNS-01 challenge response")]
    InvalidDNS01,

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [trying to load a `Config`][crate::config::Config::try_from_file] fails
    /// due to invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),
}
