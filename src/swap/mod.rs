pub mod cltv;
pub mod machine;
pub mod manager;
pub mod registry;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use bitcoin::hashes::{Hash as _, sha256};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::chain::{Currency, Route};

pub use machine::TrackedDeal;
pub use manager::SwapManager;
pub use registry::DealRegistry;

/// Which side of the swap this node is on. The maker holds the standing order
/// being filled and sends on the taker's currency; the taker initiates and
/// sends on the maker's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapRole {
    Taker,
    Maker,
}

/// Lifecycle position of a deal. Linear per role:
/// taker `SwapCreated → SwapRequested → AmountSent → AmountReceived → SwapCompleted`,
/// maker `SwapCreated → SwapAgreed → AmountSent → AmountReceived → SwapCompleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    SwapCreated,
    SwapRequested,
    SwapAgreed,
    AmountSent,
    AmountReceived,
    SwapCompleted,
}

/// Liveness of a deal, orthogonal to its phase. A deal leaves `Active`
/// exactly once; `Error` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    Active,
    Error,
    Completed,
}

/// One attempted swap, keyed by its payment hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapDeal {
    /// Hex SHA-256 of `r_preimage`; stable identifier of the deal.
    pub r_hash: String,
    /// Hex 32-byte preimage. Known to the taker from creation, learned by the
    /// maker when its outgoing payment settles.
    pub r_preimage: Option<String>,
    pub role: SwapRole,
    pub phase: SwapPhase,
    pub state: SwapState,
    /// Failure reasons, concatenated with `"; "` on repeated errors.
    pub state_reason: String,
    pub peer_pub_key: String,
    pub order_id: String,
    pub local_order_id: String,
    pub pair_id: String,
    /// Price of the maker order being filled, in quote units per base unit.
    pub price: f64,
    pub taker_currency: Currency,
    pub maker_currency: Currency,
    /// Subunits the taker receives on `taker_currency`.
    pub taker_amount: u64,
    /// Subunits the maker receives on `maker_currency`.
    pub maker_amount: u64,
    pub taker_cltv_delta: u32,
    pub maker_cltv_delta: u32,
    pub proposed_quantity: f64,
    /// Quantity accepted by the maker, once known.
    pub quantity: Option<f64>,
    /// Routes the maker will use to pay the taker, stored at acceptance.
    pub maker_to_taker_routes: Option<Vec<Route>>,
    /// The taker's node key on the taker-currency network (maker side only).
    pub taker_pub_key: Option<String>,
    pub create_time: u64,
    pub execute_time: Option<u64>,
    pub completion_time: Option<u64>,
}

/// Summary emitted when a deal's incoming amount arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResult {
    pub order_id: String,
    pub local_id: String,
    pub pair_id: String,
    pub quantity: f64,
    pub amount_received: u64,
    pub amount_sent: u64,
    pub r_hash: String,
    pub peer_pub_key: String,
    pub role: SwapRole,
}

/// Process-wide swap notifications, consumed by the order book layer.
#[derive(Debug, Clone)]
pub enum SwapEvent {
    Paid(SwapResult),
    Failed(SwapDeal),
}

/// Terminal outcome delivered once per deal over its completion channel.
#[derive(Debug, Clone)]
pub enum SwapOutcome {
    Paid(SwapResult),
    Failed { r_hash: String, reason: String },
}

/// Receiver half of a deal's completion channel, registered at creation and
/// resolved exactly once when the deal leaves `Active`.
#[derive(Debug)]
pub struct SwapCompletion {
    rx: oneshot::Receiver<SwapOutcome>,
}

impl SwapCompletion {
    pub(crate) fn new(rx: oneshot::Receiver<SwapOutcome>) -> Self {
        Self { rx }
    }

    pub async fn wait(self) -> Result<SwapOutcome> {
        self.rx
            .await
            .context("deal was dropped before reaching a terminal state")
    }
}

/// A remote maker order selected for filling.
#[derive(Debug, Clone)]
pub struct MakerOrder {
    pub id: String,
    pub pair_id: String,
    pub price: f64,
    pub peer_pub_key: String,
}

/// The local taker order initiating a swap. Quantity is in base-currency
/// subunits.
#[derive(Debug, Clone)]
pub struct TakerOrder {
    pub local_id: String,
    pub quantity: u64,
    pub is_buy: bool,
}

/// Maker-side descriptor of the local order granting an inbound swap request.
/// Quantity is in base-currency units.
#[derive(Debug, Clone)]
pub struct OrderToAccept {
    pub local_id: String,
    pub price: f64,
    pub quantity_to_accept: f64,
}

/// Hex-encoded SHA-256 payment hash of a preimage.
pub fn payment_hash_hex(preimage: &[u8; 32]) -> String {
    hex::encode(sha256::Hash::hash(preimage).to_byte_array())
}

pub(crate) fn unix_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
