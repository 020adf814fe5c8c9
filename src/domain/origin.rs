//! Authorization of the parent domain claimed by an embedding page.
//!
//! A claimed domain is authorized when, after normalization, it equals one of
//! the funding source's root domains or is a true subdomain of one
//! (`foo.paypal.com` against `paypal.com`). Matching is label-aware:
//! `haxpaypal.com` merely ends with the same characters and is rejected.

use thiserror::Error;
use url::Host;

/// Why a claimed parent domain was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OriginRejection {
    #[error("parentDomain parameter is missing")]
    Missing,
    #[error("parentDomain parameter is empty")]
    Empty,
    #[error("`{value}` is not a valid host name")]
    Malformed { value: String },
    #[error("`{value}` is an IP address, expected a host name")]
    IpLiteral { value: String },
    #[error("`{domain}` is not {expected} or one of its subdomains")]
    Unauthorized {
        domain: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid { domain: String },
    Invalid { reason: OriginRejection },
}

impl ValidationOutcome {
    pub fn into_result(self) -> Result<String, OriginRejection> {
        match self {
            ValidationOutcome::Valid { domain } => Ok(domain),
            ValidationOutcome::Invalid { reason } => Err(reason),
        }
    }
}

/// Validate `raw` against the authorized `roots`.
pub fn validate_parent_domain(raw: Option<&str>, roots: &[&'static str]) -> ValidationOutcome {
    match normalize(raw) {
        Ok(domain) => authorize(domain, roots),
        Err(reason) => ValidationOutcome::Invalid { reason },
    }
}

fn authorize(domain: String, roots: &[&'static str]) -> ValidationOutcome {
    let authorized = roots.iter().any(|root| is_same_or_subdomain(&domain, root));
    if authorized {
        return ValidationOutcome::Valid { domain };
    }

    ValidationOutcome::Invalid {
        reason: OriginRejection::Unauthorized {
            domain,
            expected: roots.first().copied().unwrap_or("an authorized domain"),
        },
    }
}

fn is_same_or_subdomain(domain: &str, root: &str) -> bool {
    if domain == root {
        return true;
    }

    domain
        .strip_suffix(root)
        .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
}

fn normalize(raw: Option<&str>) -> Result<String, OriginRejection> {
    let value = raw.ok_or(OriginRejection::Missing)?.trim();
    if value.is_empty() {
        return Err(OriginRejection::Empty);
    }

    let malformed = || OriginRejection::Malformed {
        value: value.to_string(),
    };

    let host = if value.starts_with('[') {
        value
    } else {
        match value.rsplit_once(':') {
            Some((host, port)) => {
                port.parse::<u16>().map_err(|_| malformed())?;
                host
            }
            None => value,
        }
    };

    let domain = match Host::parse(host).map_err(|_| malformed())? {
        Host::Domain(domain) => domain,
        Host::Ipv4(_) | Host::Ipv6(_) => {
            return Err(OriginRejection::IpLiteral {
                value: value.to_string(),
            });
        }
    };

    let domain = domain.strip_suffix('.').unwrap_or(&domain);
    if domain.is_empty() || domain.split('.').any(str::is_empty) {
        return Err(malformed());
    }

    Ok(domain.to_string())
}
