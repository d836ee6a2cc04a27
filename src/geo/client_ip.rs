//! Client IP extraction from HTTP headers with trust validation
//!
//! Which header is believed depends on the deployment:
//! - `cloudflare`: `CF-Connecting-IP`
//! - `standard`: `Forwarded`, then `X-Forwarded-For`, then `X-Real-IP`,
//!   skipping trusted proxy hops from the right
//! - `none`: the socket address, headers ignored

use ipnet::IpNet;
use reqwest::header::HeaderMap;
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &ClientIpConfig) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    header_str(headers, "cf-connecting-ip").and_then(|s| s.trim().parse().ok())
}

fn extract_standard_ip(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    if let Some(chain) = forwarded_chain(headers) {
        if let Some(ip) = pick_from_chain(&chain, config) {
            return Some(ip);
        }
    }

    if let Some(chain) = x_forwarded_for_chain(headers) {
        if let Some(ip) = pick_from_chain(&chain, config) {
            return Some(ip);
        }
    }

    header_str(headers, "x-real-ip").and_then(|s| s.trim().parse().ok())
}

/// `for=` values of an RFC 7239 `Forwarded` header, client first
fn forwarded_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let forwarded = header_str(headers, "forwarded")?;

    let chain: Vec<IpAddr> = forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                if name.trim().eq_ignore_ascii_case("for") {
                    parse_node(value.trim())
                } else {
                    None
                }
            })
        })
        .collect();

    (!chain.is_empty()).then_some(chain)
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let xff = header_str(headers, "x-forwarded-for")?;
    let chain: Vec<IpAddr> = xff.split(',').filter_map(|s| parse_node(s.trim())).collect();
    (!chain.is_empty()).then_some(chain)
}

/// Parse a node identifier: `1.2.3.4`, `1.2.3.4:80`, `"[2001:db8::1]:443"`
/// or a bare IPv6 address.
fn parse_node(value: &str) -> Option<IpAddr> {
    let value = value.trim_matches('"');

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(socket) = value.parse::<SocketAddr>() {
        return Some(socket.ip());
    }
    // bracketed IPv6 without a port
    value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse().ok())
}

/// Walk the chain right to left past the trusted hops
fn pick_from_chain(chain: &[IpAddr], config: &ClientIpConfig) -> Option<IpAddr> {
    if let Some(num_trusted) = config.num_trusted_proxies {
        return if chain.len() > num_trusted {
            Some(chain[chain.len() - num_trusted - 1])
        } else {
            // not enough hops, the leftmost is the best guess
            chain.first().copied()
        };
    }

    if !config.trusted_proxies.is_empty() {
        return chain
            .iter()
            .rev()
            .find(|ip| !is_trusted(**ip, &config.trusted_proxies))
            .or_else(|| chain.first())
            .copied();
    }

    chain.last().copied()
}

fn is_trusted(ip: IpAddr, trusted: &[IpNet]) -> bool {
    trusted.iter().any(|net| net.contains(&ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn create_config(mode: TrustedProxyMode) -> ClientIpConfig {
        ClientIpConfig {
            trusted_proxy_mode: mode,
            trusted_proxies: vec![],
            num_trusted_proxies: None,
        }
    }

    fn socket() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_client_ip_none_mode() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::None);

        assert_eq!(extract_client_ip(&headers, socket(), &config), socket());
    }

    #[test]
    fn test_extract_cloudflare_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Cloudflare);

        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("203.0.113.1"));
        assert_eq!(extract_client_ip(&HeaderMap::new(), socket(), &config), socket());
    }

    #[test]
    fn test_x_forwarded_for_rightmost_without_trust_config() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let config = create_config(TrustedProxyMode::Standard);

        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("198.51.100.1"));
    }

    #[test]
    fn test_x_forwarded_for_num_trusted_proxies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);
        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("198.51.100.1"));

        config.num_trusted_proxies = Some(5);
        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("203.0.113.1"));
    }

    #[test]
    fn test_x_forwarded_for_trusted_cidrs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 10.0.0.7, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("203.0.113.1"));
    }

    #[test]
    fn test_forwarded_header_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static(r#"for="[2001:db8:cafe::17]:4711";proto=https, For=198.51.100.9:80"#),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);

        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("2001:db8:cafe::17"));
    }

    #[test]
    fn test_x_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.20"));
        let config = create_config(TrustedProxyMode::Standard);

        assert_eq!(extract_client_ip(&headers, socket(), &config), ip("198.51.100.20"));
    }

    #[test]
    fn test_parse_node() {
        assert_eq!(parse_node("2001:db8::1"), Some(ip("2001:db8::1")));
        assert_eq!(parse_node("[2001:db8::1]"), Some(ip("2001:db8::1")));
        assert_eq!(parse_node("192.0.2.60:8080"), Some(ip("192.0.2.60")));
        assert_eq!(parse_node("_hidden"), None);
    }
}
