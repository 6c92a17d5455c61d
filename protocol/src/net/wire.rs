//! # Wire Framing
//!
//! Every message is a single TCP payload: one protocol tag byte followed
//! by a UTF-8 JSON body (empty for the `a` request). Connections are
//! short-lived — one message, or one request/response pair, per
//! connection. See the module doc on [`crate::net`] for the full tag
//! table.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BUFSIZE;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("empty frame")]
    Empty,

    #[error("unknown protocol tag byte {0:#04x}")]
    UnknownTag(u8),

    #[error("frame body is not valid UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A wire protocol tag: one ASCII byte identifying a message's shape and
/// how it is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `a` — request for the rendezvous's address list, and its reply.
    Addresses,
    /// `n` — new-peer announcement, rendezvous to peers and node to rendezvous.
    NewPeer,
    /// `t` — a transaction.
    Transaction,
    /// `b` — a full block.
    Block,
    /// `h` — a block header only.
    Header,
    /// `r` — transaction-inclusion proof request, and its reply.
    ProofRequest,
    /// `x` — balance request, and its reply.
    BalanceRequest,
    /// `p` — adversary-only: a "product delivered" notice.
    ProductDelivered,
}

impl Tag {
    pub fn byte(self) -> u8 {
        match self {
            Tag::Addresses => b'a',
            Tag::NewPeer => b'n',
            Tag::Transaction => b't',
            Tag::Block => b'b',
            Tag::Header => b'h',
            Tag::ProofRequest => b'r',
            Tag::BalanceRequest => b'x',
            Tag::ProductDelivered => b'p',
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            b'a' => Ok(Tag::Addresses),
            b'n' => Ok(Tag::NewPeer),
            b't' => Ok(Tag::Transaction),
            b'b' => Ok(Tag::Block),
            b'h' => Ok(Tag::Header),
            b'r' => Ok(Tag::ProofRequest),
            b'x' => Ok(Tag::BalanceRequest),
            b'p' => Ok(Tag::ProductDelivered),
            other => Err(WireError::UnknownTag(other)),
        }
    }
}

/// A decoded inbound frame: its tag and raw JSON body (empty for a
/// bodyless `a` request).
pub struct Frame {
    pub tag: Tag,
    pub body: String,
}

impl Frame {
    pub fn new<T: Serialize>(tag: Tag, body: &T) -> Self {
        Self {
            tag,
            body: serde_json::to_string(body).expect("canonical JSON encoding is infallible"),
        }
    }

    pub fn empty(tag: Tag) -> Self {
        Self { tag, body: String::new() }
    }

    pub fn raw(tag: Tag, body: String) -> Self {
        Self { tag, body }
    }

    pub fn parse_body<T: for<'de> Deserialize<'de>>(&self) -> Result<T, WireError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.body.len());
        out.push(self.tag.byte());
        out.extend_from_slice(self.body.as_bytes());
        out
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.is_empty() {
            return Err(WireError::Empty);
        }
        let tag = Tag::from_byte(data[0])?;
        let body = std::str::from_utf8(&data[1..]).map_err(|_| WireError::NotUtf8)?.to_string();
        Ok(Self { tag, body })
    }
}

fn read_capped(stream: &mut TcpStream) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    (&*stream).take(BUFSIZE as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Send `frame` to `addr` and don't wait for a reply. Used for
/// fire-and-forget broadcasts (`t`, `b`, `h`, `n`).
pub fn send_message(frame: &Frame, addr: &str) -> Result<(), WireError> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(&frame.encode())?;
    stream.shutdown(Shutdown::Both).ok();
    Ok(())
}

/// Send `frame` to `addr` and return the raw reply body (no tag byte —
/// replies are bare JSON, an ASCII integer, or the literal `"spv"`).
pub fn send_request(frame: &Frame, addr: &str) -> Result<String, WireError> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(&frame.encode())?;
    stream.shutdown(Shutdown::Write)?;
    let buf = read_capped(&mut stream)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read a single inbound frame from an accepted connection.
pub fn read_frame(stream: &mut TcpStream) -> Result<Frame, WireError> {
    let buf = read_capped(stream)?;
    Frame::decode(&buf)
}

/// Write a reply body and close the connection. Replies carry no tag
/// byte of their own.
pub fn write_reply(stream: &mut TcpStream, body: &str) -> Result<(), WireError> {
    stream.write_all(body.as_bytes())?;
    stream.shutdown(Shutdown::Both).ok();
    Ok(())
}

// ---------------------------------------------------------------------------
// Frame bodies shared across roles
// ---------------------------------------------------------------------------

/// Body of a `t` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionBody {
    pub tx_json: String,
}

/// Body of a `b` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockBody {
    pub blk_json: String,
}

/// Body of an `r` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRequestBody {
    pub tx_hash: String,
}

/// Body of an `r` reply. All three fields are `None` ("all-nulls", per
/// §6.1) when the transaction is not on the responder's best fork.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofReplyBody {
    pub blk_hash: Option<String>,
    pub proof: Option<Vec<crate::merkle::ProofStep>>,
    pub last_blk_hash: Option<String>,
}

/// Body of an `x` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRequestBody {
    pub identifier: String,
}

/// Body of an `a` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressesReplyBody {
    pub addresses: Vec<crate::net::peer::PeerRecord>,
}

/// Body of a `p` frame: the vendor announcing that the product paid for
/// by `tx_hash` has been delivered. Broadcast to every peer; a recipient
/// acts on it only if `tx_hash` is one of its own transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDeliveredBody {
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_byte_round_trips() {
        for tag in [
            Tag::Addresses,
            Tag::NewPeer,
            Tag::Transaction,
            Tag::Block,
            Tag::Header,
            Tag::ProofRequest,
            Tag::BalanceRequest,
            Tag::ProductDelivered,
        ] {
            assert_eq!(Tag::from_byte(tag.byte()).unwrap(), tag);
        }
    }

    #[test]
    fn unknown_tag_byte_rejected() {
        assert!(matches!(Tag::from_byte(b'z'), Err(WireError::UnknownTag(b'z'))));
    }

    #[test]
    fn frame_decode_rejects_empty_buffer() {
        assert!(matches!(Frame::decode(&[]), Err(WireError::Empty)));
    }

    #[test]
    fn frame_body_round_trips_json() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Body {
            tx_hash: String,
        }
        let body = Body { tx_hash: "abc".to_string() };
        let frame = Frame::new(Tag::ProofRequest, &body);
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.tag, Tag::ProofRequest);
        assert_eq!(decoded.parse_body::<Body>().unwrap(), body);
    }
}
