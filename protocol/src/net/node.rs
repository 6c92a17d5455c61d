//! # Network Node Base
//!
//! The peer-list and broadcast machinery shared by every role: honest
//! miners, SPV clients, and the adversary variants all embed one of
//! these. Consensus logic never lives here — this module only gets bytes
//! on and off the wire and hands parsed frames to whatever role-specific
//! dispatcher is listening.

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;
use thiserror::Error;

use crate::config::BROADCAST_POOL_SIZE;
use crate::net::peer::{NodeRole, PeerRecord};
use crate::net::wire::{read_frame, send_message, send_request, Frame, Tag, WireError};

#[derive(Debug, Error)]
pub enum NetError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A node's identity and peer list. Shared by every role via composition,
/// not inheritance — an honest miner, an SPV client, and a selfish miner
/// each hold one and layer their own state and dispatch logic around it.
pub struct NetNode {
    role: NodeRole,
    name: String,
    host: String,
    port: u16,
    pubkey: String,
    peers: RwLock<Vec<PeerRecord>>,
}

impl NetNode {
    pub fn new(role: NodeRole, name: impl Into<String>, port: u16, pubkey: String) -> Self {
        Self {
            role,
            name: name.into(),
            host: "127.0.0.1".to_string(),
            port,
            pubkey,
            peers: RwLock::new(Vec::new()),
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn self_record(&self) -> PeerRecord {
        PeerRecord {
            address: (self.host.clone(), self.port),
            pubkey: self.pubkey.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }

    /// Current peer list snapshot.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers.read().clone()
    }

    /// First known peer playing `role`. Replaces the source network's
    /// linear scan for a peer by class-name string (`find_peer`) with a
    /// lookup keyed on the typed role tag instead.
    pub fn peer_with_role(&self, role: NodeRole) -> Option<PeerRecord> {
        self.peers.read().iter().find(|p| p.role == role).cloned()
    }

    /// Add or update a peer, deduplicated by address — matches the
    /// rendezvous contract's own dedup rule (§6.2) so a repeated
    /// announcement for an already-known address never grows the list.
    pub fn add_peer(&self, peer: PeerRecord) {
        let mut peers = self.peers.write();
        if let Some(existing) = peers.iter_mut().find(|p| p.address == peer.address) {
            *existing = peer;
        } else {
            peers.push(peer);
        }
    }

    /// Fetch the current address list from the rendezvous (tag `a`) and
    /// announce this node to it (tag `n`), which the rendezvous in turn
    /// fans out to every previously-registered peer.
    pub fn register_with_rendezvous(&self, rendezvous_addr: &str) -> Result<(), NetError> {
        use crate::net::wire::AddressesReplyBody;

        let reply = send_request(&Frame::empty(Tag::Addresses), rendezvous_addr)?;
        // The rendezvous's `a` reply keeps its tag byte (§6.1: `a{"addresses":...}`),
        // unlike every other reply on the wire.
        let body = reply.strip_prefix('a').unwrap_or(&reply);
        if let Ok(parsed) = serde_json::from_str::<AddressesReplyBody>(body) {
            for peer in parsed.addresses {
                self.add_peer(peer);
            }
        }
        send_message(&Frame::new(Tag::NewPeer, &self.self_record()), rendezvous_addr)?;
        Ok(())
    }

    /// Fire-and-forget `frame` to every known peer. Sends run across a
    /// small fixed-size pool (§5: broadcasts must not serialize on a
    /// single slow peer) and a failed send to one peer never affects
    /// delivery to the others.
    pub fn broadcast(&self, frame: &Frame) {
        for chunk in self.peers().chunks(BROADCAST_POOL_SIZE) {
            thread::scope(|scope| {
                for peer in chunk {
                    let addr = peer.addr_string();
                    scope.spawn(move || {
                        if let Err(err) = send_message(frame, &addr) {
                            tracing::warn!(peer = %addr, error = %err, "broadcast send failed");
                        }
                    });
                }
            });
        }
    }

    /// Send `frame` to every known peer and collect whichever reply
    /// bodies come back, in no particular order. Peers that error out or
    /// never reply are simply absent from the result — callers (SPV
    /// quorum logic) are built to tolerate that.
    pub fn broadcast_request(&self, frame: &Frame) -> Vec<String> {
        let mut replies = Vec::new();
        for chunk in self.peers().chunks(BROADCAST_POOL_SIZE) {
            let (tx, rx) = mpsc::channel();
            thread::scope(|scope| {
                for peer in chunk {
                    let addr = peer.addr_string();
                    let tx = tx.clone();
                    scope.spawn(move || {
                        if let Ok(reply) = send_request(frame, &addr) {
                            let _ = tx.send(reply);
                        }
                    });
                }
            });
            drop(tx);
            replies.extend(rx.iter());
        }
        replies
    }
}

/// Accept connections on `127.0.0.1:port` forever, spawning one thread
/// per inbound connection. Each thread reads exactly one frame and hands
/// it to `handler` along with the still-open stream, so request/response
/// tags can write a reply before the connection closes. Matches §4.7: the
/// listener accepts, reads, dispatches, and closes — there is no single
/// event loop (§5).
pub fn serve<H>(port: u16, handler: H) -> Result<(), NetError>
where
    H: Fn(Frame, TcpStream) + Send + Sync + 'static,
{
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    let handler = Arc::new(handler);
    for incoming in listener.incoming() {
        let mut stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let handler = Arc::clone(&handler);
        thread::spawn(move || match read_frame(&mut stream) {
            Ok(frame) => handler(frame, stream),
            Err(err) => tracing::warn!(error = %err, "dropping malformed inbound frame"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> PeerRecord {
        PeerRecord {
            address: ("127.0.0.1".to_string(), port),
            pubkey: "a".repeat(96),
            name: format!("peer-{port}"),
            role: NodeRole::Miner,
        }
    }

    #[test]
    fn add_peer_deduplicates_by_address() {
        let node = NetNode::new(NodeRole::Miner, "self", 9000, "b".repeat(96));
        node.add_peer(peer(9001));
        node.add_peer(peer(9001));
        assert_eq!(node.peers().len(), 1);
    }

    #[test]
    fn add_peer_updates_existing_entry_in_place() {
        let node = NetNode::new(NodeRole::Miner, "self", 9000, "b".repeat(96));
        node.add_peer(peer(9001));
        let mut updated = peer(9001);
        updated.name = "renamed".to_string();
        node.add_peer(updated);
        assert_eq!(node.peers().len(), 1);
        assert_eq!(node.peers()[0].name, "renamed");
    }

    #[test]
    fn self_record_reflects_identity() {
        let node = NetNode::new(NodeRole::Vendor, "v1", 7000, "c".repeat(96));
        let record = node.self_record();
        assert_eq!(record.address, ("127.0.0.1".to_string(), 7000));
        assert_eq!(record.role, NodeRole::Vendor);
    }

    #[test]
    fn peer_with_role_finds_first_match() {
        let node = NetNode::new(NodeRole::Miner, "self", 9000, "b".repeat(96));
        node.add_peer(peer(9001));
        let mut vendor = peer(9002);
        vendor.role = NodeRole::Vendor;
        node.add_peer(vendor.clone());
        assert_eq!(node.peer_with_role(NodeRole::Vendor), Some(vendor));
        assert!(node.peer_with_role(NodeRole::DoubleSpendMiner).is_none());
    }

    #[test]
    fn broadcast_request_ignores_unreachable_peers() {
        let node = NetNode::new(NodeRole::Miner, "self", 9000, "b".repeat(96));
        node.add_peer(peer(1)); // nothing listens on port 1
        let frame = Frame::empty(Tag::BalanceRequest);
        let replies = node.broadcast_request(&frame);
        assert!(replies.is_empty());
    }
}
