use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::Currency;

/// Wire envelope for swap packets. `res_id` correlates a response or an error
/// with the request that caused it; requests and standalone notifications
/// leave it unset. Framing and delivery belong to the p2p layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub id: Uuid,
    pub res_id: Option<Uuid>,
    pub body: PacketBody,
}

impl Packet {
    pub fn request(body: PacketBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            res_id: None,
            body,
        }
    }

    pub fn response(res_id: Uuid, body: PacketBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            res_id: Some(res_id),
            body,
        }
    }

    /// A standalone notification; correlates to no request.
    pub fn notification(body: PacketBody) -> Self {
        Self::request(body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PacketBody {
    SwapRequest(SwapRequestBody),
    SwapResponse(SwapResponseBody),
    SwapComplete(SwapCompleteBody),
    SwapError(SwapErrorBody),
}

/// Taker → maker: proposal to execute a swap filling one of the maker's orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequestBody {
    pub r_hash: String,
    pub order_id: String,
    pub pair_id: String,
    pub proposed_quantity: f64,
    pub taker_currency: Currency,
    pub maker_currency: Currency,
    pub taker_amount: u64,
    pub maker_amount: u64,
    pub taker_cltv_delta: u32,
}

/// Maker → taker: acceptance (quantity + maker-leg timelock) or rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponseBody {
    pub r_hash: String,
    pub quantity: Option<f64>,
    pub maker_cltv_delta: Option<u32>,
    pub rejection_reason: Option<RejectionReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    PairNotSupported,
    OrderNotFound,
    OrderUnavailable,
    NoRoute,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::PairNotSupported => "PAIR_NOT_SUPPORTED",
            RejectionReason::OrderNotFound => "ORDER_NOT_FOUND",
            RejectionReason::OrderUnavailable => "ORDER_UNAVAILABLE",
            RejectionReason::NoRoute => "NO_ROUTE",
        };
        f.write_str(s)
    }
}

/// Notification that the sender's side of the swap finished successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapCompleteBody {
    pub r_hash: String,
}

/// Notification (or response) that the sender failed the deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapErrorBody {
    pub r_hash: String,
    pub error_message: String,
}
