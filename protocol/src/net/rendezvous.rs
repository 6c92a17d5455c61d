//! # Rendezvous Registry
//!
//! The bootstrap contract: a single well-known address holding an
//! append-only list of registered peer descriptors, deduplicated by
//! address. Registering a new peer also forwards its announcement to
//! every peer that registered before it, so an already-connected node's
//! peer list stays in sync without polling. Not fault-tolerant — a single
//! point of failure by design, matching a demo bootstrap server rather
//! than a production directory service.

use parking_lot::RwLock;

use crate::config::BROADCAST_POOL_SIZE;
use crate::net::peer::PeerRecord;
use crate::net::wire::{send_message, Frame, Tag};

#[derive(Default)]
pub struct Rendezvous {
    addresses: RwLock<Vec<PeerRecord>>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every registered peer.
    pub fn addresses(&self) -> Vec<PeerRecord> {
        self.addresses.read().clone()
    }

    /// Register `peer`, deduplicated by address. Returns the peers that
    /// were already registered before this call — the caller forwards the
    /// new announcement to exactly those, via [`Rendezvous::forward`]. A
    /// repeated registration of an already-known address is a no-op and
    /// forwards to nobody.
    pub fn register(&self, peer: PeerRecord) -> Vec<PeerRecord> {
        let mut addresses = self.addresses.write();
        if addresses.iter().any(|p| p.address == peer.address) {
            return Vec::new();
        }
        let previously_registered = addresses.clone();
        addresses.push(peer);
        previously_registered
    }

    /// Forward `peer`'s announcement to every address in `targets`. Runs
    /// across the same small fixed pool every broadcast uses; one
    /// unreachable target never blocks delivery to the rest.
    pub fn forward(peer: &PeerRecord, targets: &[PeerRecord]) {
        let frame = Frame::new(Tag::NewPeer, peer);
        for chunk in targets.chunks(BROADCAST_POOL_SIZE) {
            std::thread::scope(|scope| {
                for target in chunk {
                    let addr = target.addr_string();
                    let frame = &frame;
                    scope.spawn(move || {
                        if let Err(err) = send_message(frame, &addr) {
                            tracing::warn!(peer = %addr, error = %err, "rendezvous forward failed");
                        }
                    });
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::peer::NodeRole;

    fn peer(port: u16) -> PeerRecord {
        PeerRecord {
            address: ("127.0.0.1".to_string(), port),
            pubkey: "a".repeat(96),
            name: format!("peer-{port}"),
            role: NodeRole::Miner,
        }
    }

    #[test]
    fn first_registration_has_nobody_to_forward_to() {
        let rendezvous = Rendezvous::new();
        assert!(rendezvous.register(peer(1000)).is_empty());
        assert_eq!(rendezvous.addresses().len(), 1);
    }

    #[test]
    fn second_registration_forwards_to_the_first() {
        let rendezvous = Rendezvous::new();
        rendezvous.register(peer(1000));
        let targets = rendezvous.register(peer(1001));
        assert_eq!(targets, vec![peer(1000)]);
        assert_eq!(rendezvous.addresses().len(), 2);
    }

    #[test]
    fn duplicate_address_registration_is_a_noop() {
        let rendezvous = Rendezvous::new();
        rendezvous.register(peer(1000));
        let targets = rendezvous.register(peer(1000));
        assert!(targets.is_empty());
        assert_eq!(rendezvous.addresses().len(), 1);
    }
}
