//! Account IP allow-list matching.
//!
//! An account may carry a comma-separated list of single IPv4 addresses
//! and/or CIDR ranges. Network and broadcast addresses never match a
//! range. The client address is the first hop of X-Forwarded-For
//! (single trusted proxy; multi-proxy extraction is a deployment
//! concern outside this crate).

use std::net::Ipv4Addr;

/// Extract the client address from an X-Forwarded-For value.
pub fn client_ip(x_forwarded_for: Option<&str>) -> Option<Ipv4Addr> {
    x_forwarded_for?
        .split(',')
        .next()?
        .trim()
        .parse::<Ipv4Addr>()
        .ok()
}

/// True when `client` matches one of the allow-list entries. An
/// unparseable entry never matches.
pub fn is_allowed(allow_list: &str, client: Ipv4Addr) -> bool {
    allow_list
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .any(|entry| entry_matches(entry, client))
}

fn entry_matches(entry: &str, client: Ipv4Addr) -> bool {
    match entry.split_once('/') {
        Some((net, prefix)) => {
            let (Ok(net), Ok(prefix)) = (net.parse::<Ipv4Addr>(), prefix.parse::<u8>()) else {
                return false;
            };
            if prefix > 32 {
                return false;
            }
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix))
            };
            let network = u32::from(net) & mask;
            let broadcast = network | !mask;
            let addr = u32::from(client);
            // Host addresses only; the network and broadcast addresses
            // are excluded from range matches.
            addr > network && addr < broadcast && (addr & mask) == network
        }
        None => entry.parse::<Ipv4Addr>() == Ok(client),
    }
}
