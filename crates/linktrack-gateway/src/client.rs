use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderName};
use linktrack_redirector::Visit;

use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Visitor metadata pulled from an incoming redirect request.
#[derive(Debug, Clone)]
pub struct ClientVisit(pub Visit);

impl FromRequestParts<AppState> for ClientVisit {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip_address = client_ip(&parts.headers, peer, state.trust_proxy_headers());

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        Ok(ClientVisit(Visit {
            ip_address: ip_address.map(|ip| ip.to_string()),
            user_agent: header_value(&parts.headers, &header::USER_AGENT),
            referrer: header_value(&parts.headers, &header::REFERER),
            query,
            via_qr: false,
        }))
    }
}

/// Picks the client address: proxy headers first when trusted, then the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(parse_ip);
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip);
        if real_ip.is_some() {
            return real_ip;
        }
    }
    peer
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn proxy_headers_ignored_unless_trusted() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let map = headers(&[(X_FORWARDED_FOR, "203.0.113.7")]);
        assert_eq!(client_ip(&map, Some(peer), false), Some(peer));
    }

    #[test]
    fn first_forwarded_address_wins() {
        let map = headers(&[
            (X_FORWARDED_FOR, "203.0.113.7, 10.0.0.2"),
            (X_REAL_IP, "198.51.100.4"),
        ]);
        assert_eq!(
            client_ip(&map, None, true),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let map = headers(&[(X_FORWARDED_FOR, "garbage"), (X_REAL_IP, "2001:db8::1")]);
        assert_eq!(
            client_ip(&map, None, true),
            Some("2001:db8::1".parse().unwrap())
        );

        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), Some(peer));
        assert_eq!(client_ip(&HeaderMap::new(), None, true), None);
    }
}
