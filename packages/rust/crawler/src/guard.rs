//! Target URL validation and SSRF protection.

use std::net::IpAddr;

use url::Url;

use compintel_shared::{CompintelError, Result};

/// Parse a user- or model-supplied URL, adding `https://` when no scheme is given.
pub fn parse_target_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CompintelError::validation("empty URL"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| CompintelError::validation(format!("invalid URL {raw:?}: {e}")))?;

    if url.host_str().is_none() {
        return Err(CompintelError::validation(format!("URL has no host: {raw}")));
    }

    Ok(url)
}

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_adds_https_scheme() {
        let url = parse_target_url("  acme.test/pricing ").unwrap();
        assert_eq!(url.as_str(), "https://acme.test/pricing");

        let url = parse_target_url("http://acme.test").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_target_url("").is_err());
        assert!(parse_target_url("https://").is_err());
    }

    #[test]
    fn ssrf_blocks_non_http_schemes() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(is_ssrf_target(&url));
        let url = Url::parse("ftp://acme.test/a").unwrap();
        assert!(is_ssrf_target(&url));
    }

    #[test]
    fn ssrf_blocks_private_ips() {
        for raw in [
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://100.64.1.1/",
            "http://[::1]/",
            "http://[fd00::1]/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url), "{raw} should be blocked");
        }
    }

    #[test]
    fn ssrf_blocks_local_hostnames() {
        let url = Url::parse("http://localhost:3000/api").unwrap();
        assert!(is_ssrf_target(&url));
        let url = Url::parse("http://metadata.internal/").unwrap();
        assert!(is_ssrf_target(&url));
    }

    #[test]
    fn ssrf_allows_public() {
        let url = Url::parse("https://acme.test/pricing").unwrap();
        assert!(!is_ssrf_target(&url));
        let url = Url::parse("http://93.184.216.34/").unwrap();
        assert!(!is_ssrf_target(&url));
    }
}
