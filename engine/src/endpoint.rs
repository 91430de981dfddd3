//! Endpoint resolution from container placement metadata.

use std::net::IpAddr;

use sandlot_types::PlacementInfo;

/// Suffix stored after a private address.
pub const PRIVATE_ADDRESS_ANNOTATION: &str =
    "(private IP - may only be accessible within the provider network)";

/// Caveat returned to callers alongside a private endpoint.
pub const PRIVATE_ENDPOINT_NOTE: &str =
    "This is a private IP address and may only be accessible within the provider network";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// `http://{ip}:{port}`.
    pub address: String,
    pub is_private: bool,
}

impl ResolvedEndpoint {
    /// The form persisted on the record: the address, annotated when private.
    #[must_use]
    pub fn stored_form(&self) -> String {
        if self.is_private {
            format!("{} {PRIVATE_ADDRESS_ANNOTATION}", self.address)
        } else {
            self.address.clone()
        }
    }
}

/// Derive a reachable address for a placed task.
///
/// Only placements with a network-interface attachment resolve. The public
/// address is preferred; the private one is the fallback. Values that do not
/// parse as an IP address are skipped.
#[must_use]
pub fn resolve_endpoint(placement: &PlacementInfo, port: u16) -> Option<ResolvedEndpoint> {
    placement.network_interface()?;

    let ip = [placement.public_ipv4(), placement.private_ipv4()]
        .into_iter()
        .flatten()
        .find_map(|raw| raw.parse::<IpAddr>().ok())?;

    let address = match ip {
        IpAddr::V4(v4) => format!("http://{v4}:{port}"),
        IpAddr::V6(v6) => format!("http://[{v6}]:{port}"),
    };
    Some(ResolvedEndpoint {
        address,
        is_private: is_private_address(ip),
    })
}

/// RFC 1918 for IPv4, unique-local `fc00::/7` for IPv6.
#[must_use]
pub fn is_private_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}
