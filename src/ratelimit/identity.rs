//! Client identity derivation from transport addresses.

use std::fmt;
use std::net::SocketAddr;

use crate::error::{MarqueeError, Result};

/// The key a client's token bucket is stored under.
///
/// Derived from the host part of the peer address, so every connection from
/// the same IP shares one bucket regardless of source port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Derive an identity from a `host:port` remote address.
    ///
    /// Accepts `1.2.3.4:5678`, `[::1]:5678` and `name:5678`. A missing or
    /// non-numeric port, an empty host, or an unbracketed IPv6 literal is an
    /// `InvalidClientIdentity` error.
    pub fn from_remote_addr(remote_addr: &str) -> Result<Self> {
        if let Ok(addr) = remote_addr.parse::<SocketAddr>() {
            return Ok(Self::from(addr));
        }

        let invalid = || MarqueeError::InvalidClientIdentity(remote_addr.to_string());
        let (host, port) = remote_addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || host.contains(':') || port.parse::<u16>().is_err() {
            return Err(invalid());
        }

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self(host.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for ClientIdentity {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.ip().to_string())
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_drops_port() {
        let id = ClientIdentity::from_remote_addr("192.168.1.10:51234").unwrap();
        assert_eq!(id.as_str(), "192.168.1.10");
    }

    #[test]
    fn test_ipv6_drops_brackets_and_port() {
        let id = ClientIdentity::from_remote_addr("[::1]:8080").unwrap();
        assert_eq!(id.as_str(), "::1");
    }

    #[test]
    fn test_hostname_accepted() {
        let id = ClientIdentity::from_remote_addr("gateway.internal:443").unwrap();
        assert_eq!(id.as_str(), "gateway.internal");
    }

    #[test]
    fn test_same_host_different_ports_are_equal() {
        let a = ClientIdentity::from_remote_addr("10.0.0.1:1000").unwrap();
        let b = ClientIdentity::from_remote_addr("10.0.0.1:2000").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        for bad in ["", "10.0.0.1", ":80", "10.0.0.1:http", "::1:80", "[]:80"] {
            let err = ClientIdentity::from_remote_addr(bad).unwrap_err();
            assert!(
                matches!(err, MarqueeError::InvalidClientIdentity(_)),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
