//! Attribution of requests to a throttle identity.
//!
//! Authenticated callers are keyed by user id. Anonymous callers are keyed by
//! network address. `X-Forwarded-For` is honoured only when the TCP peer is a
//! configured proxy, and only the hops appended by trusted proxies are
//! believed: the list is read from the right and the first untrusted address
//! is the client.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use ipnet::IpNet;
use jobgate_core::UserIdentity;
use jobgate_domain::ThrottleIdentity;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Default)]
pub struct ClientAddressResolver {
    trusted_proxies: Arc<[IpNet]>,
}

impl ClientAddressResolver {
    pub fn new(trusted_proxies: Vec<IpNet>) -> Self {
        Self {
            trusted_proxies: trusted_proxies.into(),
        }
    }

    /// Returns the caller's address, or `None` when the connection has no
    /// peer information.
    pub fn resolve(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
        let peer = peer.map(|address| address.to_canonical());

        match peer {
            Some(address) if self.is_trusted(address) => {
                self.forwarded_client(headers).or(Some(address))
            }
            other => other,
        }
    }

    /// Walks `X-Forwarded-For` right to left, skipping trusted proxies.
    /// Returns `None` when every hop is trusted or any hop is malformed.
    fn forwarded_client(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;

        for hop in value.rsplit(',') {
            let address = hop.trim().parse::<IpAddr>().ok()?.to_canonical();
            if !self.is_trusted(address) {
                return Some(address);
            }
        }

        None
    }

    fn is_trusted(&self, address: IpAddr) -> bool {
        self.trusted_proxies
            .iter()
            .any(|network| network.contains(&address))
    }
}

/// Picks the bucket identity for a request.
pub fn throttle_identity(user: Option<&UserIdentity>, address: Option<IpAddr>) -> ThrottleIdentity {
    if let Some(identity) = user.and_then(|user| ThrottleIdentity::user(user.subject()).ok()) {
        return identity;
    }

    address.map_or(ThrottleIdentity::UnknownAddress, ThrottleIdentity::Address)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use axum::http::{HeaderMap, HeaderValue};
    use jobgate_core::{UserIdentity, UserRole};
    use jobgate_domain::ThrottleIdentity;
    use proptest::prelude::*;

    use super::{ClientAddressResolver, throttle_identity};

    fn resolver() -> ClientAddressResolver {
        let networks = ["10.0.0.0/8", "::1/128"]
            .into_iter()
            .filter_map(|network| network.parse().ok())
            .collect();
        ClientAddressResolver::new(networks)
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn trusted_proxy_chain_yields_the_nearest_untrusted_hop() {
        let peer = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
        let resolved = resolver().resolve(Some(peer), &forwarded("203.0.113.9, 10.1.2.3"));
        assert_eq!(resolved, Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))));
    }

    #[test]
    fn client_supplied_prefix_is_ignored() {
        let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let client = Some(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 77)));

        assert_eq!(
            resolver().resolve(Some(peer), &forwarded("1.1.1.1, 198.51.100.77")),
            client
        );
        assert_eq!(
            resolver().resolve(Some(peer), &forwarded("2.2.2.2, 198.51.100.77")),
            client
        );
    }

    #[test]
    fn all_trusted_or_malformed_chains_fall_back_to_peer() {
        let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));

        assert_eq!(
            resolver().resolve(Some(peer), &forwarded("10.9.9.9, 10.1.1.1")),
            Some(peer)
        );
        assert_eq!(
            resolver().resolve(Some(peer), &forwarded("198.51.100.77, bogus")),
            Some(peer)
        );
    }

    #[test]
    fn untrusted_peer_cannot_spoof_its_address() {
        let peer = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4));
        let resolved = resolver().resolve(Some(peer), &forwarded("203.0.113.9"));
        assert_eq!(resolved, Some(peer));
    }

    #[test]
    fn malformed_forwarded_header_falls_back_to_peer() {
        let peer = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let resolved = resolver().resolve(Some(peer), &forwarded("not-an-ip"));
        assert_eq!(resolved, Some(peer));
    }

    #[test]
    fn mapped_ipv4_peers_are_canonicalised() {
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());
        let resolved = resolver().resolve(Some(mapped), &forwarded("192.0.2.1"));
        assert_eq!(resolved, Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))));
    }

    #[test]
    fn users_are_keyed_by_subject_before_address() {
        let user = UserIdentity::new("u-42", "Ada", "ada@acme.io", UserRole::JobSeeker);
        let address = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));

        assert_eq!(
            throttle_identity(Some(&user), address).to_string(),
            "user:u-42"
        );
        assert_eq!(throttle_identity(None, address).to_string(), "ip:192.0.2.1");
        assert_eq!(
            throttle_identity(None, None),
            ThrottleIdentity::UnknownAddress
        );
    }

    proptest! {
        #[test]
        fn forged_prefixes_never_change_the_resolved_client(
            forged in any::<[u8; 4]>(),
        ) {
            let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
            let mut headers = HeaderMap::new();
            let chain = format!("{}, 198.51.100.77", Ipv4Addr::from(forged));
            let Ok(value) = HeaderValue::from_str(&chain) else {
                panic!("invalid header value: {chain}");
            };
            headers.insert("x-forwarded-for", value);

            prop_assert_eq!(
                resolver().resolve(Some(peer), &headers),
                Some(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 77)))
            );
        }

        #[test]
        fn peers_outside_trusted_ranges_always_resolve_to_themselves(
            octets in any::<[u8; 4]>(),
        ) {
            prop_assume!(octets[0] != 10);
            let peer = IpAddr::V4(Ipv4Addr::from(octets));
            let resolved = resolver().resolve(Some(peer), &forwarded("192.0.2.200"));
            prop_assert_eq!(resolved, Some(peer));
        }
    }
}
