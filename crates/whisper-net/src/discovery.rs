//! Bootstrap node address parsing.
//!
//! Bootstrap nodes arrive as a comma-separated multiaddr list (the
//! `BOOTSTRAP_NODES` environment variable). Malformed entries are logged
//! and skipped rather than failing startup.

use libp2p::Multiaddr;
use tracing::{info, warn};

/// Parse a comma-separated multiaddr list into validated `Multiaddr`s.
///
/// Empty segments are ignored; malformed segments are logged and skipped.
pub fn parse_bootstrap_nodes(raw: &str) -> Vec<Multiaddr> {
    let addrs: Vec<Multiaddr> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<Multiaddr>() {
            Ok(addr) => Some(addr),
            Err(e) => {
                warn!(addr = %s, error = %e, "Skipping invalid bootstrap multiaddr");
                None
            }
        })
        .collect();

    if !addrs.is_empty() {
        info!(count = addrs.len(), "Loaded bootstrap nodes");
    }

    addrs
}
