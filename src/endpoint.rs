//! Endpoint resolution.
//!
//! Turns a host specification string such as
//! `8.8.8.8:google-public-dns-a,m.root-servers.net` into validated
//! [`Endpoint`]s. Hostnames are resolved to an IPv4 literal through a
//! [`HostResolver`]; how a failure is treated depends on the strict flag.

use std::io;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::error::{PingError, Result};

/// A resolved probe target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Dotted-decimal IPv4 literal that is probed.
    pub address: String,
    /// Human-readable display label.
    pub label: String,
}

impl Endpoint {
    /// Create an endpoint from an address and label.
    pub fn new(address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            label: label.into(),
        }
    }
}

/// Check whether `host` has IPv4 literal syntax.
///
/// Only the shape is checked (four dot-separated decimal groups); octet
/// ranges are not, so `999.999.999.999` passes.
pub fn is_ipv4_literal(host: &str) -> bool {
    static IPV4_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = IPV4_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+$")
            .expect("failed to compile ipv4 regex")
    });

    regex.is_match(host)
}

/// Forward hostname lookup returning an IPv4 address.
#[async_trait::async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to its first IPv4 address.
    async fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr>;
}

/// Resolver backed by the system's standard lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait::async_trait]
impl HostResolver for SystemResolver {
    async fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr> {
        let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
        addrs
            .into_iter()
            .find_map(|addr| match addr.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no ipv4 address found"))
    }
}

/// Parse and resolve a comma-separated host specification.
///
/// Each token is `address_or_hostname[:label]`. With `strict` set, the first
/// malformed or unresolvable token aborts the whole resolution. Otherwise
/// such tokens are skipped and the surviving endpoints keep input order.
pub async fn resolve(
    spec: &str,
    strict: bool,
    resolver: &dyn HostResolver,
) -> Result<Vec<Endpoint>> {
    let mut endpoints = Vec::new();

    for token in spec.split(',') {
        let (host, label) = match token.split_once(':') {
            Some((host, label)) if !label.is_empty() => (host, label),
            Some((host, _)) => (host, host),
            None => (token, token),
        };

        if host.is_empty() {
            if strict {
                return Err(PingError::MalformedToken(token.to_string()));
            }
            tracing::warn!(token = %token, "Skipping host token with empty host");
            continue;
        }

        if is_ipv4_literal(host) {
            endpoints.push(Endpoint::new(host, label));
            continue;
        }

        match resolver.resolve_ipv4(host).await {
            Ok(ip) => {
                tracing::debug!(host = %host, address = %ip, "Resolved host");
                endpoints.push(Endpoint::new(ip.to_string(), label));
            }
            Err(e) if strict => {
                return Err(PingError::Resolution {
                    host: host.to_string(),
                    source: e,
                });
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "Skipping unresolvable host");
            }
        }
    }

    Ok(endpoints)
}
