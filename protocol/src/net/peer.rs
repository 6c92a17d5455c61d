//! # Peer Records
//!
//! Every node announces itself with a descriptor carrying its address,
//! public key, a human-readable name, and its role. The role drives
//! dispatch: a replacement for the source network's string-matched peer
//! "class", which is exactly the kind of stringly-typed routing a sum
//! type exists to replace.

use serde::{Deserialize, Serialize};

/// The role a peer plays in the network. Carried in every `n`
/// announcement and stored in the local peer list, so handlers can
/// dispatch on it directly instead of string-matching a class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Miner,
    SpvClient,
    SelfishMiner,
    DoubleSpendMiner,
    DoubleSpendSpvClient,
    Vendor,
}

/// One entry in a node's peer list, and the shape of an `n` announcement
/// body (`{address:[host,port], pubkey, name, class}` in wire terms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: (String, u16),
    pub pubkey: String,
    pub name: String,
    #[serde(rename = "class")]
    pub role: NodeRole,
}

impl PeerRecord {
    pub fn addr_string(&self) -> String {
        format!("{}:{}", self.address.0, self.address.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_record_round_trips_through_json() {
        let peer = PeerRecord {
            address: ("127.0.0.1".to_string(), 9000),
            pubkey: "a".repeat(96),
            name: "miner-1".to_string(),
            role: NodeRole::Miner,
        };
        let json = serde_json::to_string(&peer).unwrap();
        assert!(json.contains("\"class\":\"miner\""));
        let parsed: PeerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, peer);
    }

    #[test]
    fn addr_string_joins_host_and_port() {
        let peer = PeerRecord {
            address: ("10.0.0.1".to_string(), 4000),
            pubkey: "a".repeat(96),
            name: "x".to_string(),
            role: NodeRole::Vendor,
        };
        assert_eq!(peer.addr_string(), "10.0.0.1:4000");
    }
}
