//! SSRF (Server-Side Request Forgery) validation
//!
//! Source and callback URLs come from callers, so before any request is made
//! the URL is checked for:
//! - an http/https scheme
//! - membership in the host allowlist, when one is configured
//! - private/internal addresses, either literal or resolved (DNS rebinding)
//!
//! Redirect hops are checked too, through [`UrlGuard::redirect_policy`].

use reqwest::redirect::Policy;
use reqwest::Url;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use tokio::net::lookup_host;

/// Most redirect hops followed before a request fails
const MAX_REDIRECTS: usize = 10;

/// URL policy shared by the fetcher and the notifier
#[derive(Clone, Debug, Default)]
pub struct UrlGuard {
    /// Permit private/loopback/link-local hosts (local development, tests)
    pub allow_private_hosts: bool,
    /// Permitted hosts; subdomains of an entry are permitted too
    pub allowlist: Option<Vec<String>>,
}

/// A URL that passed the guard
#[derive(Clone, Debug)]
pub struct CheckedUrl {
    pub url: Url,
    /// Validated address the host resolved to; requests must connect here
    pub pinned: Option<SocketAddr>,
}

impl CheckedUrl {
    /// Host name and address to hand to `ClientBuilder::resolve`
    pub fn pin(&self) -> Option<(&str, SocketAddr)> {
        Some((self.url.host_str()?, self.pinned?))
    }
}

impl UrlGuard {
    pub fn new(allow_private_hosts: bool, allowlist: Option<Vec<String>>) -> Self {
        Self {
            allow_private_hosts,
            allowlist,
        }
    }

    /// Parse `url` and check it against the policy
    pub async fn check(&self, url: &str) -> Result<Url, String> {
        self.check_resolved(url).await.map(|checked| checked.url)
    }

    /// Like [`UrlGuard::check`], also resolving the host and returning the
    /// validated address so the connection cannot be rebound to another one
    pub async fn check_resolved(&self, url: &str) -> Result<CheckedUrl, String> {
        let parsed = Url::parse(url).map_err(|e| format!("Invalid URL format: {}", e))?;
        let host = self.check_target(&parsed)?;

        if self.allow_private_hosts || host.parse::<IpAddr>().is_ok() {
            return Ok(CheckedUrl {
                url: parsed,
                pinned: None,
            });
        }

        let port = parsed.port_or_known_default().unwrap_or(80);
        let mut pinned = None;
        match lookup_host((host.as_str(), port)).await {
            Ok(addrs) => {
                for addr in addrs {
                    if is_private_ip(&addr.ip()) {
                        return Err(format!(
                            "Hostname resolves to private/internal IP address: {}",
                            addr.ip()
                        ));
                    }
                    pinned.get_or_insert(addr);
                }
            }
            Err(e) => {
                // Unresolvable hosts fail later at request time
                tracing::warn!(host = %host, error = %e, "Failed to resolve hostname for SSRF validation");
            }
        }

        Ok(CheckedUrl {
            url: parsed,
            pinned,
        })
    }

    /// Checks that need no DNS lookup: scheme, allowlist, IP literals and
    /// internal host names. Returns the normalized host.
    pub fn check_target(&self, url: &Url) -> Result<String, String> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err("URL must start with http:// or https://".to_string());
        }

        let host = url
            .host_str()
            .ok_or_else(|| "URL must have a host".to_string())?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_lowercase();

        if let Some(allowed_domains) = &self.allowlist {
            let is_allowed = allowed_domains.iter().any(|allowed| {
                let allowed = allowed.to_lowercase();
                host == allowed || host.ends_with(&format!(".{}", allowed))
            });
            if !is_allowed {
                return Err(format!("URL hostname '{}' is not in the allowed list", host));
            }
        }

        if self.allow_private_hosts {
            return Ok(host);
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err("Private/internal IP addresses are not allowed".to_string());
            }
        } else if is_internal_hostname(&host) {
            return Err("Localhost and internal hostnames are not allowed".to_string());
        }

        Ok(host)
    }

    /// Redirect policy that applies [`UrlGuard::check_target`] to every hop
    pub fn redirect_policy(&self) -> Policy {
        let guard = self.clone();
        Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error(format!("more than {} redirects", MAX_REDIRECTS));
            }
            match guard.check_target(attempt.url()) {
                Ok(_) => attempt.follow(),
                Err(reason) => {
                    tracing::warn!(target_url = %attempt.url(), reason = %reason, "Redirect blocked");
                    attempt.error(format!("redirect blocked: {}", reason))
                }
            }
        })
    }
}

fn is_internal_hostname(host: &str) -> bool {
    host == "localhost"
        || host.ends_with(".localhost")
        || host.ends_with(".local")
        || host.ends_with(".internal")
        || host.ends_with(".corp")
}

/// Check if an IP address is private/internal
///
/// Covers loopback, RFC 1918 ranges, link-local, multicast, unspecified and
/// `0.0.0.0/8` for IPv4, plus loopback, unspecified, multicast, link-local
/// (`fe80::/10`) and unique local (`fc00::/7`) for IPv6.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_multicast()
                || ipv4.is_unspecified()
                || ipv4.octets()[0] == 0
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6.is_multicast()
                || is_ipv6_link_local(ipv6)
                || is_ipv6_unique_local(ipv6)
        }
    }
}

fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xfe00 == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn strict() -> UrlGuard {
        UrlGuard::default()
    }

    #[tokio::test]
    async fn test_rejects_localhost() {
        for url in [
            "http://localhost/image.jpg",
            "http://127.0.0.1/image.jpg",
            "http://[::1]/image.jpg",
            "http://0.0.0.0/image.jpg",
        ] {
            assert!(strict().check(url).await.is_err(), "{} should be rejected", url);
        }
    }

    #[tokio::test]
    async fn test_rejects_private_ips() {
        for url in [
            "http://192.168.1.1/image.jpg",
            "http://10.0.0.1/image.jpg",
            "http://172.16.0.1/image.jpg",
            "http://169.254.169.254/latest/meta-data",
            "http://[::ffff:10.0.0.1]/image.jpg",
        ] {
            assert!(strict().check(url).await.is_err(), "{} should be rejected", url);
        }
    }

    #[tokio::test]
    async fn test_rejects_internal_hostnames() {
        for url in [
            "http://internal.service.local/image.jpg",
            "http://service.corp/image.jpg",
            "http://service.internal/image.jpg",
        ] {
            assert!(strict().check(url).await.is_err(), "{} should be rejected", url);
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_schemes() {
        for url in ["file:///etc/passwd", "ftp://example.com/file", "not a url"] {
            assert!(strict().check(url).await.is_err(), "{} should be rejected", url);
        }
    }

    #[tokio::test]
    async fn test_public_ip_literal_passes() {
        let url = strict().check("http://93.184.216.34/cover.jpg").await.unwrap();
        assert_eq!(url.path(), "/cover.jpg");
    }

    #[tokio::test]
    async fn test_allow_private_hosts() {
        let guard = UrlGuard::new(true, None);
        assert!(guard.check("http://127.0.0.1:8080/cover.jpg").await.is_ok());
        assert!(guard.check("file:///etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_allowlist() {
        let guard = UrlGuard::new(
            true,
            Some(vec!["example.com".to_string(), "cdn.example.net".to_string()]),
        );
        assert!(guard.check("https://example.com/a.jpg").await.is_ok());
        assert!(guard.check("https://img.example.com/a.jpg").await.is_ok());
        assert!(guard.check("https://cdn.example.net/a.jpg").await.is_ok());
        assert!(guard.check("https://evil.com/a.jpg").await.is_err());
        assert!(guard.check("https://notexample.com/a.jpg").await.is_err());
    }

    #[test]
    fn test_check_target_needs_no_lookup() {
        let guard = UrlGuard::new(false, Some(vec!["example.com".to_string()]));
        let target = |url: &str| guard.check_target(&Url::parse(url).unwrap());

        assert_eq!(target("https://img.example.com/a.jpg").unwrap(), "img.example.com");
        assert!(target("http://169.254.169.254/latest/meta-data").is_err());
        assert!(target("http://evil.com/a.jpg").is_err());

        let open = UrlGuard::default();
        let target = |url: &str| open.check_target(&Url::parse(url).unwrap());
        assert!(target("http://169.254.169.254/latest/meta-data").is_err());
        assert!(target("http://metadata.internal/").is_err());
        assert!(target("http://localhost:8080/").is_err());
        assert!(target("http://93.184.216.34/a.jpg").is_ok());
    }

    #[tokio::test]
    async fn test_literal_and_private_hosts_are_not_pinned() {
        let checked = UrlGuard::default()
            .check_resolved("http://93.184.216.34/cover.jpg")
            .await
            .unwrap();
        assert!(checked.pin().is_none());

        let checked = UrlGuard::new(true, None)
            .check_resolved("http://localhost:8080/cover.jpg")
            .await
            .unwrap();
        assert!(checked.pin().is_none());
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(172, 31, 255, 1))));
        assert!(!is_private_ip(&IpAddr::V4(Ipv4Addr::new(172, 32, 0, 1))));
        assert!(!is_private_ip(&IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(!is_private_ip(&IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0, 0, 0, 0, 0, 0x1111))));
    }
}
