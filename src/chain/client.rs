use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Currency;

/// A payment route discovered on one chain. Hops are opaque node identifiers;
/// only the outermost timelock matters to the swap coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub total_timelock: u32,
    pub hops: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainInfo {
    pub block_height: u32,
}

#[derive(Debug, Clone)]
pub struct SendPaymentRequest {
    /// Amount in subunits of the client's currency.
    pub amount: u64,
    /// Destination node public key on the client's network.
    pub destination: String,
    /// Hex-encoded payment hash locking the HTLC.
    pub payment_hash: String,
    /// Final-hop timelock delta in blocks.
    pub final_cltv_delta: u32,
}

/// Outcome of a synchronous payment attempt. A daemon-level failure surfaces
/// as `payment_error`; success carries the revealed preimage.
#[derive(Debug, Clone, Default)]
pub struct PaymentResult {
    pub payment_error: Option<String>,
    pub payment_preimage: Option<[u8; 32]>,
}

/// An inbound HTLC held pending by a chain client, reported to the swap
/// coordinator for resolution against a known payment hash.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub r_hash: String,
    pub amount_msat: u64,
    pub timeout_height: u32,
    pub height_now: u32,
}

/// Seam to the per-currency payment-channel daemon. One client per currency;
/// the daemon owns HTLC construction, routing, and settlement. Inbound HTLCs
/// with a known hash are held by the daemon and handed to
/// [`crate::swap::SwapManager::resolve_hash`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn currency(&self) -> Currency;

    fn is_connected(&self) -> bool;

    /// Configured final-hop timelock delta for payments terminating at this node.
    fn cltv_delta(&self) -> u32;

    async fn query_routes(
        &self,
        amount: u64,
        final_cltv_delta: u32,
        num_routes: u32,
        pub_key: &str,
    ) -> Result<Vec<Route>>;

    async fn get_info(&self) -> Result<ChainInfo>;

    /// Send a payment to a destination and wait for settlement.
    async fn send_payment_sync(&self, request: SendPaymentRequest) -> Result<PaymentResult>;

    /// Send a payment along precomputed routes and wait for settlement.
    async fn send_to_route_sync(&self, routes: &[Route], payment_hash: &str)
    -> Result<PaymentResult>;
}
