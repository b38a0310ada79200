//! Client identity extraction.
//!
//! # Design Decisions
//! - Identity is the peer address of the TCP connection; forwarding headers
//!   are not trusted
//! - IPv4-mapped IPv6 addresses are folded to plain IPv4 so one client has
//!   one key regardless of the socket family
//! - A missing address is handled by `MissingAddressPolicy`

use std::net::SocketAddr;

use crate::config::MissingAddressPolicy;
use crate::limiter::ClientIdentity;

/// Identity for a request from `peer`.
///
/// `None` means the request must be rejected as unidentifiable.
pub fn resolve_identity(peer: Option<SocketAddr>, policy: MissingAddressPolicy) -> Option<ClientIdentity> {
    match (peer, policy) {
        (Some(addr), _) => Some(ClientIdentity::new(addr.ip().to_canonical().to_string())),
        (None, MissingAddressPolicy::SharedKey) => Some(ClientIdentity::anonymous()),
        (None, MissingAddressPolicy::Reject) => None,
    }
}
