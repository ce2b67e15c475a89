//! SSRF guard for media URLs.
//!
//! Every URL the pipeline downloads from, whether supplied by a caller or
//! returned by the resolver, passes through [`validate_media_url`]. A URL is
//! accepted when it:
//! - uses `http` or `https`
//! - has a host
//! - does not point at, or resolve to, a private or internal address
//!
//! Local development can turn the address check off with `allow_private`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL resolves to private/internal IP address: {0}")]
    PrivateIpDetected(IpAddr),

    #[error("Failed to resolve hostname: {0}")]
    DnsResolutionFailed(String),
}

/// Whether an IPv4 address is loopback, private, link-local, broadcast,
/// unspecified, documentation, CGNAT (100.64.0.0/10) or benchmarking
/// (198.18.0.0/15).
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
        || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
        || (octets[0] == 198 && (octets[1] == 18 || octets[1] == 19))
}

/// Whether an IPv6 address is internal.
///
/// Covers loopback, unspecified, link-local (fe80::/10), unique local
/// (fc00::/7), documentation (2001:db8::/32) and IPv4-mapped private
/// addresses.
pub fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    let segments = ip.segments();
    if segments[0] & 0xFFC0 == 0xFE80 || segments[0] & 0xFE00 == 0xFC00 {
        return true;
    }
    if segments[0] == 0x2001 && segments[1] == 0x0DB8 {
        return true;
    }
    ip.to_ipv4_mapped()
        .map(|v4| is_private_ipv4(&v4))
        .unwrap_or(false)
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => is_private_ipv6(ipv6),
    }
}

/// Validates a media download URL for SSRF protection
///
/// Raw IP hosts are checked directly; domain names are resolved and every
/// returned address must be public. With `allow_private` set only the scheme
/// and host checks run.
///
/// # Example
/// ```rust,ignore
/// use transcribe_gateway::utils::url_validation::validate_media_url;
///
/// assert!(validate_media_url("https://cdn.example.com/a.mp3", false).await.is_ok());
/// assert!(validate_media_url("ftp://cdn.example.com/a.mp3", false).await.is_err());
/// assert!(validate_media_url("http://10.0.0.5/a.mp3", false).await.is_err());
/// ```
pub async fn validate_media_url(url: &str, allow_private: bool) -> Result<(), UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme = parsed.scheme();
    if scheme != "https" && scheme != "http" {
        return Err(UrlValidationError::UnsupportedScheme(scheme.to_string()));
    }

    let host = parsed.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.is_empty() {
        return Err(UrlValidationError::MissingHost);
    }

    if allow_private {
        return Ok(());
    }

    // host() distinguishes IP literals; host_str() keeps IPv6 brackets
    let ip = match parsed.host() {
        Some(url::Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
        Some(url::Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
        Some(url::Host::Domain(_)) => None,
        None => return Err(UrlValidationError::MissingHost),
    };
    if let Some(ip) = ip {
        if is_private_ip(&ip) {
            warn!(host = %host, "Media URL points at a private IP address");
            return Err(UrlValidationError::PrivateIpDetected(ip));
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(443);
    let socket_addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| UrlValidationError::DnsResolutionFailed(format!("{host}: {e}")))?
        .collect();

    if socket_addrs.is_empty() {
        return Err(UrlValidationError::DnsResolutionFailed(format!(
            "No addresses found for {host}"
        )));
    }

    for addr in socket_addrs {
        if is_private_ip(&addr.ip()) {
            warn!(
                host = %host,
                resolved_ip = %addr.ip(),
                "Media URL resolves to private IP address (SSRF protection)"
            );
            return Err(UrlValidationError::PrivateIpDetected(addr.ip()));
        }
    }

    Ok(())
}
