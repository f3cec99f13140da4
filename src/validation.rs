//! Pre-validation of [RFC-8555][RFC-8555] [DNS-01] challenge records.
//!
//! Before asking the CA to validate, a client can check that its TXT record is already visible
//! on every reachable authoritative server. Records are looked up at the end of the alias
//! chain, where the CA itself will look.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

use crate::authority::{AuthorityResolver, LookupResult};
use crate::config::Config;
use crate::error::Error;
use base64::engine::general_purpose;
use base64::{alphabet, engine, DecodeError, Engine};
use lazy_static::lazy_static;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum TxtValidationError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(DecodeError),
    #[error("invalid decoded length: found {actual} bytes, expected {expected}")]
    InvalidDecodedLength { actual: usize, expected: usize },
}

const DNS01_DECODED_LEN_BYTES: usize = 32;

lazy_static! {
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

/// Check that `txt` is a BASE64URL encoded 32 byte SHA256 digest.
///
/// # Errors
///
/// Returns a [`TxtValidationError`] describing why the value is not a DNS-01 response.
pub fn valid_dns01(txt: &str) -> Result<(), TxtValidationError> {
    match BASE64_ENGINE.decode(txt) {
        Ok(raw) => match raw.len() {
            DNS01_DECODED_LEN_BYTES => Ok(()),
            _ => Err(TxtValidationError::InvalidDecodedLength {
                actual: raw.len(),
                expected: DNS01_DECODED_LEN_BYTES,
            }),
        },
        Err(err) => Err(TxtValidationError::InvalidEncoding(err)),
    }
}

/// Waits for a challenge TXT record to appear on the authoritative servers.
pub struct PropagationCheck {
    resolver: AuthorityResolver,
    retry_count: u32,
    retry_delay: Duration,
}

impl PropagationCheck {
    pub fn new(resolver: AuthorityResolver, config: &Config) -> Self {
        PropagationCheck {
            resolver,
            retry_count: config.pre_validate_retry_count,
            retry_delay: config.pre_validate_retry_delay,
        }
    }

    /// Returns `Ok(true)` once every reachable authoritative server for `record` serves
    /// `expected`, or `Ok(false)` when it still doesn't after the configured retries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDNS01`] if `expected` isn't a DNS-01 challenge response value.
    pub async fn wait_for_txt(&self, record: &str, expected: &str) -> Result<bool, Error> {
        if let Err(err) = valid_dns01(expected) {
            debug!("refusing to check \"{expected}\": {err}");
            return Err(Error::InvalidDNS01);
        }
        let mut attempt = 0;
        loop {
            let authority = self.resolver.get_authority(record, true).await;
            if self.is_visible(&authority, expected).await {
                info!("{record} is visible on {authority}");
                return Ok(true);
            }
            if attempt >= self.retry_count {
                warn!("{record} is not visible after {} attempts: {authority}", attempt + 1);
                return Ok(false);
            }
            attempt += 1;
            debug!("{record} not visible yet, retrying in {:?}", self.retry_delay);
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn is_visible(&self, authority: &LookupResult, expected: &str) -> bool {
        let mut live = Vec::default();
        for client in &authority.nameservers {
            if client.connect().await {
                live.push(client.clone());
            }
        }
        if live.is_empty() {
            debug!("no reachable server for {}, asking the system client", authority.domain);
            live.push(self.resolver.system_client());
        }
        for client in live {
            match client.txt_records(&authority.domain).await {
                Ok(values) if values.iter().any(|v| v == expected) => {}
                Ok(values) => {
                    debug!("{client} serves {values:?} for {}", authority.domain);
                    return false;
                }
                Err(err) => {
                    debug!("{client} failed to look up TXT of {}: {err}", authority.domain);
                    return false;
                }
            }
        }
        true
    }
}
