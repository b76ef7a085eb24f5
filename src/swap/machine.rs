use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{
    SwapCompletion, SwapDeal, SwapEvent, SwapOutcome, SwapPhase, SwapResult, SwapRole, SwapState,
    unix_time_secs,
};
use crate::p2p::Peer;

/// A registered deal plus the runtime handles that do not belong in the
/// serializable record: the peer the deal is negotiated with, the completion
/// channel registered at creation, and whether a paid event went out.
///
/// Transition legality is asserted here; an illegal phase or state change is
/// a programming error, not a protocol error.
pub struct TrackedDeal {
    deal: SwapDeal,
    peer: Arc<dyn Peer>,
    completion: Option<oneshot::Sender<SwapOutcome>>,
    paid: bool,
}

impl std::fmt::Debug for TrackedDeal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedDeal")
            .field("deal", &self.deal)
            .field("peer", &self.peer.node_pub_key())
            .field("completion", &self.completion.is_some())
            .field("paid", &self.paid)
            .finish()
    }
}

impl TrackedDeal {
    pub fn new(deal: SwapDeal, peer: Arc<dyn Peer>) -> (Self, SwapCompletion) {
        let (tx, rx) = oneshot::channel();
        let tracked = Self {
            deal,
            peer,
            completion: Some(tx),
            paid: false,
        };
        (tracked, SwapCompletion::new(rx))
    }

    pub fn deal(&self) -> &SwapDeal {
        &self.deal
    }

    pub fn deal_mut(&mut self) -> &mut SwapDeal {
        &mut self.deal
    }

    pub fn peer(&self) -> Arc<dyn Peer> {
        self.peer.clone()
    }

    /// Advances the deal to `phase`, asserting the transition is legal for the
    /// deal's role and current phase. `AmountSent` stamps `execute_time`,
    /// `AmountReceived` reports the swap as paid, and `SwapCompleted` stamps
    /// `completion_time` and moves the deal to its terminal `Completed` state.
    pub fn set_phase(&mut self, phase: SwapPhase, events: &mpsc::UnboundedSender<SwapEvent>) {
        assert_eq!(
            self.deal.state,
            SwapState::Active,
            "phase of deal {} cannot advance while {:?}",
            self.deal.r_hash,
            self.deal.state,
        );

        let legal = match phase {
            SwapPhase::SwapCreated => false,
            SwapPhase::SwapRequested => {
                self.deal.role == SwapRole::Taker && self.deal.phase == SwapPhase::SwapCreated
            }
            SwapPhase::SwapAgreed => {
                self.deal.role == SwapRole::Maker && self.deal.phase == SwapPhase::SwapCreated
            }
            SwapPhase::AmountSent => match self.deal.role {
                SwapRole::Taker => self.deal.phase == SwapPhase::SwapRequested,
                SwapRole::Maker => self.deal.phase == SwapPhase::SwapAgreed,
            },
            SwapPhase::AmountReceived => self.deal.phase == SwapPhase::AmountSent,
            SwapPhase::SwapCompleted => self.deal.phase == SwapPhase::AmountReceived,
        };
        assert!(
            legal,
            "illegal phase transition {:?} -> {:?} for {:?} deal {}",
            self.deal.phase, phase, self.deal.role, self.deal.r_hash,
        );

        self.deal.phase = phase;
        tracing::debug!(r_hash = %self.deal.r_hash, phase = ?phase, "deal phase advanced");

        match phase {
            SwapPhase::AmountSent => {
                self.deal.execute_time = Some(unix_time_secs());
            }
            SwapPhase::AmountReceived => {
                let result = SwapResult {
                    order_id: self.deal.order_id.clone(),
                    local_id: self.deal.local_order_id.clone(),
                    pair_id: self.deal.pair_id.clone(),
                    quantity: self.deal.quantity.unwrap_or(self.deal.proposed_quantity),
                    amount_received: self.deal.maker_amount,
                    amount_sent: self.deal.taker_amount,
                    r_hash: self.deal.r_hash.clone(),
                    peer_pub_key: self.deal.peer_pub_key.clone(),
                    role: self.deal.role,
                };
                self.paid = true;
                if let Some(tx) = self.completion.take() {
                    tx.send(SwapOutcome::Paid(result.clone())).ok();
                }
                events.send(SwapEvent::Paid(result)).ok();
            }
            SwapPhase::SwapCompleted => {
                self.deal.completion_time = Some(unix_time_secs());
                self.deal.state = SwapState::Completed;
                tracing::info!(r_hash = %self.deal.r_hash, "swap completed");
            }
            _ => {}
        }
    }

    /// Fails the deal with `reason`. A first failure freezes the deal and
    /// reports it failed, unless it was already reported paid; further
    /// failures only append to `state_reason`.
    pub fn set_error(&mut self, reason: &str, events: &mpsc::UnboundedSender<SwapEvent>) {
        match self.deal.state {
            SwapState::Error => {
                self.deal.state_reason.push_str("; ");
                self.deal.state_reason.push_str(reason);
                tracing::warn!(
                    r_hash = %self.deal.r_hash,
                    reason = %reason,
                    "additional error on failed deal"
                );
            }
            SwapState::Active => {
                self.deal.state = SwapState::Error;
                self.deal.state_reason = reason.to_string();
                tracing::warn!(r_hash = %self.deal.r_hash, reason = %reason, "deal failed");
                if self.paid {
                    return;
                }
                if let Some(tx) = self.completion.take() {
                    tx.send(SwapOutcome::Failed {
                        r_hash: self.deal.r_hash.clone(),
                        reason: reason.to_string(),
                    })
                    .ok();
                }
                events.send(SwapEvent::Failed(self.deal.clone())).ok();
            }
            SwapState::Completed => {
                panic!("completed deal {} cannot change state", self.deal.r_hash)
            }
        }
    }
}
