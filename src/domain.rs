//! Domain name helpers and registrable domain parsing.
//!
//! The delegation walk stops at the registrable domain of a name: the public suffix plus one
//! label, e.g. `example.co.uk` for `www.example.co.uk`. Finding that boundary is the job of a
//! [`DomainParser`]. [`SuffixList`] implements one over the rules of the
//! [Public Suffix List][psl].
//!
//! [psl]: https://publicsuffix.org/list/

use crate::error::Error;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use trust_dns_client::rr::Name;

/// Normalize a domain for use as a cache key: surrounding whitespace and the trailing dot are
/// stripped and ASCII letters are lowercased.
pub fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Return `domain` with its leftmost label removed, or `None` for a single label.
pub fn parent(domain: &str) -> Option<&str> {
    domain.split_once('.').map(|(_, rest)| rest)
}

/// Convert a normalized domain into a fully qualified [`Name`] for querying.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if the domain isn't a valid DNS name.
pub fn to_fqdn(domain: &str) -> Result<Name, Error> {
    Name::from_str(&format!("{domain}."))
        .map_err(|_| Error::InvalidName(domain.to_string()))
}

/// Find the registrable domain of a name.
pub trait DomainParser: Send + Sync {
    /// Return the registrable domain of `domain`, normalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRegistrableDomain`] when `domain` is a public suffix itself, or
    /// another error when the name can't be parsed at all.
    fn registrable_domain(&self, domain: &str) -> Result<String, Error>;
}

/// A longest-match public suffix parser.
///
/// Supports the three rule kinds of the list format: plain (`co.uk`), wildcard (`*.ck`) and
/// exception (`!www.ck`). A name matching no rule falls back to the implicit `*` rule, so
/// with an empty list the registrable domain is always the last two labels.
#[derive(Default, Debug, Clone)]
pub struct SuffixList {
    rules: HashSet<String>,
    wildcards: HashSet<String>,
    exceptions: HashSet<String>,
}

impl SuffixList {
    /// Load a list in the `public_suffix_list.dat` format from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read.
    pub async fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(p).await?;
        Ok(contents.parse()?)
    }

    /// Number of labels in the public suffix of `labels`.
    fn suffix_len(&self, labels: &[&str]) -> usize {
        // Candidates go from longest to shortest, so the first match is the longest match.
        for start in 0..labels.len() {
            let candidate = labels[start..].join(".");
            if self.exceptions.contains(&candidate) {
                return labels.len() - start - 1;
            }
            if self.rules.contains(&candidate) {
                return labels.len() - start;
            }
            // `*.ck` is stored as `ck` and matches any single label in front of it.
            if start + 1 < labels.len() && self.wildcards.contains(&labels[start + 1..].join(".")) {
                return labels.len() - start;
            }
        }
        1
    }
}

impl FromStr for SuffixList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut list = SuffixList::default();
        for line in s.lines() {
            let Some(rule) = line.split_whitespace().next() else {
                continue;
            };
            if rule.starts_with("//") {
                continue;
            }
            let rule = normalize(rule);
            if let Some(exception) = rule.strip_prefix('!') {
                list.exceptions.insert(exception.to_string());
            } else if let Some(wildcard) = rule.strip_prefix("*.") {
                list.wildcards.insert(wildcard.to_string());
            } else {
                list.rules.insert(rule);
            }
        }
        Ok(list)
    }
}

impl DomainParser for SuffixList {
    fn registrable_domain(&self, domain: &str) -> Result<String, Error> {
        let domain = normalize(domain);
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.iter().any(|l| l.is_empty()) {
            return Err(Error::InvalidName(domain));
        }
        let suffix_len = self.suffix_len(&labels);
        if labels.len() <= suffix_len {
            return Err(Error::NoRegistrableDomain(domain));
        }
        Ok(labels[labels.len() - suffix_len - 1..].join("."))
    }
}
