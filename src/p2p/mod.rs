pub mod packets;

use anyhow::Result;
use async_trait::async_trait;

use crate::chain::Currency;

pub use packets::{
    Packet, PacketBody, RejectionReason, SwapCompleteBody, SwapErrorBody, SwapRequestBody,
    SwapResponseBody,
};

/// Handle to a connected counterparty node. Connection management, handshakes,
/// and packet framing live in the p2p layer; the swap coordinator only needs
/// the peer's identity, its per-currency chain pubkeys, and a way to send.
#[async_trait]
pub trait Peer: Send + Sync {
    /// The peer's node identifier on the p2p network.
    fn node_pub_key(&self) -> &str;

    /// The pubkey the peer advertised for its chain client of `currency`,
    /// if it advertised one during the handshake.
    fn chain_pub_key(&self, currency: Currency) -> Option<String>;

    async fn send_packet(&self, packet: Packet) -> Result<()>;
}
