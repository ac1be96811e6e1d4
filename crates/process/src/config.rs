//! Bootstrap network configuration.
//!
//! Peripheral to the mutation core: a node either originates a fresh network
//! or joins one through a known bootstrap peer. Nothing here touches the
//! saga machinery.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BOOTSTRAP_PORT: u16 = 4622;

/// How this node enters the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkMode {
    /// Originate a new network; nobody to bootstrap from.
    Initial,
    /// Join an existing network through the given peer.
    Bootstrap { address: IpAddr, port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    node_id: String,
    mode: NetworkMode,
}

impl NetworkConfig {
    /// Configuration for the first node of a new network.
    pub fn initial(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            mode: NetworkMode::Initial,
        }
    }

    /// Configuration for a node joining through `address:port`.
    pub fn bootstrap(node_id: impl Into<String>, address: IpAddr, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            mode: NetworkMode::Bootstrap { address, port },
        }
    }

    /// Join through `address` on the default port.
    pub fn bootstrap_default_port(node_id: impl Into<String>, address: IpAddr) -> Self {
        Self::bootstrap(node_id, address, DEFAULT_BOOTSTRAP_PORT)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn mode(&self) -> &NetworkMode {
        &self.mode
    }

    pub fn is_initial_peer(&self) -> bool {
        matches!(self.mode, NetworkMode::Initial)
    }

    pub fn bootstrap_peer(&self) -> Option<(IpAddr, u16)> {
        match self.mode {
            NetworkMode::Initial => None,
            NetworkMode::Bootstrap { address, port } => Some((address, port)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_initial_has_no_bootstrap_peer() {
        let config = NetworkConfig::initial("node-1");
        assert!(config.is_initial_peer());
        assert_eq!(config.bootstrap_peer(), None);
    }

    #[test]
    fn test_bootstrap_carries_address_and_port() {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
        let config = NetworkConfig::bootstrap("node-2", addr, 9000);
        assert!(!config.is_initial_peer());
        assert_eq!(config.bootstrap_peer(), Some((addr, 9000)));

        let config = NetworkConfig::bootstrap_default_port("node-3", addr);
        assert_eq!(config.bootstrap_peer(), Some((addr, DEFAULT_BOOTSTRAP_PORT)));
    }
}
