//! Timelock arithmetic for the maker leg.
//!
//! The maker pays on the taker's chain against a route whose end-to-end
//! timelock was observed in taker-chain blocks. The maker's own incoming HTLC
//! must outlive that route expressed in maker-chain blocks, plus the maker
//! chain's configured final-hop delta as a safety margin. The relative block
//! rate of the two chains is supplied by the caller as a pair of weights; the
//! coordinator uses the chains' configured final-hop deltas as those weights,
//! which is a policy choice, not a chain constant.

/// Scales `route_cltv_delta` (in taker-chain blocks) into maker-chain blocks
/// by the ratio of the two block-rate weights, and adds `maker_margin`.
pub fn scale_route_cltv(
    route_cltv_delta: u32,
    taker_weight: f64,
    maker_weight: f64,
    maker_margin: u32,
) -> u32 {
    let scaled = f64::from(route_cltv_delta) * maker_weight / taker_weight;
    maker_margin + scaled.round() as u32
}
