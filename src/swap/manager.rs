use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chain::{
    ChainClient, ChainClientMap, Currency, ResolveRequest, SendPaymentRequest, split_pair_id,
};
use crate::p2p::{
    Packet, PacketBody, Peer, SwapCompleteBody, SwapErrorBody, SwapRequestBody, SwapResponseBody,
};

use super::machine::TrackedDeal;
use super::registry::{DealRegistry, SharedDeal};
use super::{
    MakerOrder, OrderToAccept, SwapCompletion, SwapDeal, SwapEvent, SwapPhase, SwapRole, SwapState,
    TakerOrder, cltv, payment_hash_hex, unix_time_secs,
};

/// Coordinates HTLC atomic swaps between two payment-channel networks.
///
/// The manager owns the deal registry and drives each deal through its phase
/// sequence: the taker path via [`begin_swap`](Self::begin_swap) and
/// [`handle_swap_response`](Self::handle_swap_response), the maker path via
/// [`accept_deal`](Self::accept_deal), and both via
/// [`resolve_hash`](Self::resolve_hash), which the chain clients invoke when
/// an inbound HTLC with a known payment hash is held pending.
///
/// All deal mutations happen on one logical execution context; deal locks are
/// released before every network suspension point.
pub struct SwapManager {
    clients: ChainClientMap,
    registry: DealRegistry,
    events: mpsc::UnboundedSender<SwapEvent>,
}

impl SwapManager {
    pub fn new(clients: ChainClientMap, events: mpsc::UnboundedSender<SwapEvent>) -> Self {
        Self {
            clients,
            registry: DealRegistry::new(),
            events,
        }
    }

    /// Whether a trading pair can currently be swapped: both currencies have
    /// a connected chain client.
    pub fn is_pair_supported(&self, pair_id: &str) -> bool {
        self.clients.is_pair_supported(pair_id)
    }

    /// Snapshot of a tracked deal, if any.
    pub fn get_deal(&self, r_hash: &str) -> Option<SwapDeal> {
        self.registry
            .get(r_hash)
            .map(|shared| shared.lock().expect("deal mutex poisoned").deal().clone())
    }

    /// Forgets a deal. Unknown hashes are ignored.
    pub fn remove_deal(&self, r_hash: &str) {
        self.registry.remove(r_hash);
    }

    /// Initiates a swap as the taker: fills `maker`'s order with the local
    /// `taker` order. Generates the preimage, registers the deal, transmits a
    /// swap request to the peer, and returns the payment hash together with
    /// the deal's completion channel.
    pub async fn begin_swap(
        &self,
        maker: &MakerOrder,
        taker: &TakerOrder,
        peer: Arc<dyn Peer>,
    ) -> Result<(String, SwapCompletion)> {
        anyhow::ensure!(
            peer.node_pub_key() == maker.peer_pub_key,
            "peer {} does not own maker order {} (expected {})",
            peer.node_pub_key(),
            maker.id,
            maker.peer_pub_key
        );
        anyhow::ensure!(
            self.is_pair_supported(&maker.pair_id),
            "pair {} is not supported",
            maker.pair_id
        );

        let (base, quote) = split_pair_id(&maker.pair_id)?;
        let (taker_currency, maker_currency) = if taker.is_buy {
            // Buying the base: we receive base, the maker receives quote.
            (base, quote)
        } else {
            (quote, base)
        };

        let taker_client = self.clients.require(taker_currency)?;
        let taker_cltv_delta = taker_client.cltv_delta();

        let base_config = self.clients.config(base)?;
        let proposed_quantity = taker.quantity as f64 / base_config.subunits_per_unit;
        let (base_amount, quote_amount) =
            self.swap_amounts(proposed_quantity, maker.price, base, quote)?;
        let (taker_amount, maker_amount) = if taker.is_buy {
            (base_amount, quote_amount)
        } else {
            (quote_amount, base_amount)
        };

        let preimage: [u8; 32] = rand::random();
        let r_hash = payment_hash_hex(&preimage);

        let deal = SwapDeal {
            r_hash: r_hash.clone(),
            r_preimage: Some(hex::encode(preimage)),
            role: SwapRole::Taker,
            phase: SwapPhase::SwapCreated,
            state: SwapState::Active,
            state_reason: String::new(),
            peer_pub_key: peer.node_pub_key().to_string(),
            order_id: maker.id.clone(),
            local_order_id: taker.local_id.clone(),
            pair_id: maker.pair_id.clone(),
            price: maker.price,
            taker_currency,
            maker_currency,
            taker_amount,
            maker_amount,
            taker_cltv_delta,
            maker_cltv_delta: 0,
            proposed_quantity,
            quantity: None,
            maker_to_taker_routes: None,
            taker_pub_key: None,
            create_time: unix_time_secs(),
            execute_time: None,
            completion_time: None,
        };
        tracing::debug!(
            r_hash = %r_hash,
            order_id = %maker.id,
            pair_id = %maker.pair_id,
            "initiating swap deal"
        );

        let (tracked, completion) = TrackedDeal::new(deal, peer.clone());
        let shared = self.registry.add(tracked)?;

        if let Err(err) = self.verify_setup(peer.as_ref(), taker_currency, maker_currency) {
            let reason = format!("{err:#}");
            shared
                .lock()
                .expect("deal mutex poisoned")
                .set_error(&reason, &self.events);
            return Err(err);
        }

        let request = Packet::request(PacketBody::SwapRequest(SwapRequestBody {
            r_hash: r_hash.clone(),
            order_id: maker.id.clone(),
            pair_id: maker.pair_id.clone(),
            proposed_quantity,
            taker_currency,
            maker_currency,
            taker_amount,
            maker_amount,
            taker_cltv_delta,
        }));
        if let Err(err) = peer.send_packet(request).await {
            let reason = format!("failed to send swap request: {err:#}");
            shared
                .lock()
                .expect("deal mutex poisoned")
                .set_error(&reason, &self.events);
            anyhow::bail!(reason);
        }

        shared
            .lock()
            .expect("deal mutex poisoned")
            .set_phase(SwapPhase::SwapRequested, &self.events);

        Ok((r_hash, completion))
    }

    /// Handles the maker's response to one of our swap requests: records the
    /// maker-leg timelock and accepted quantity, then pays the maker on its
    /// currency. The awaited payment settles only after our own incoming HTLC
    /// was resolved, so on success the deal has already been reported paid.
    pub async fn handle_swap_response(&self, packet: &Packet) -> Result<()> {
        let PacketBody::SwapResponse(body) = &packet.body else {
            anyhow::bail!("expected a swap response packet");
        };
        let Some(shared) = self.registry.get(&body.r_hash) else {
            tracing::warn!(r_hash = %body.r_hash, "swap response for unknown deal");
            return Ok(());
        };

        {
            let tracked = shared.lock().expect("deal mutex poisoned");
            let (state, phase) = (tracked.deal().state, tracked.deal().phase);
            if state != SwapState::Active || phase != SwapPhase::SwapRequested {
                tracing::debug!(
                    r_hash = %body.r_hash,
                    state = ?state,
                    phase = ?phase,
                    "ignoring swap response for a deal that is not awaiting one"
                );
                return Ok(());
            }
        }

        if let Some(reason) = body.rejection_reason {
            let reason = format!("swap request rejected: {reason}");
            shared
                .lock()
                .expect("deal mutex poisoned")
                .set_error(&reason, &self.events);
            return Ok(());
        }

        let (client, request) = {
            let mut tracked = shared.lock().expect("deal mutex poisoned");
            match self.prepare_taker_send(&mut tracked, body) {
                Ok(prepared) => {
                    tracked.set_phase(SwapPhase::AmountSent, &self.events);
                    prepared
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    tracked.set_error(&reason, &self.events);
                    let peer = tracked.peer();
                    drop(tracked);
                    self.send_swap_error(peer, body.r_hash.clone(), reason, None)
                        .await;
                    return Ok(());
                }
            }
        };

        let destination = request.destination.clone();
        let amount = request.amount;
        let sent = client.send_payment_sync(request).await;

        let preimage = match sent {
            Ok(result) => {
                if let Some(err) = result.payment_error {
                    Err(format!(
                        "got a payment error sending {amount} to {destination}: {err}"
                    ))
                } else if let Some(preimage) = result.payment_preimage {
                    Ok(preimage)
                } else {
                    Err(format!(
                        "payment to {destination} settled without returning a preimage"
                    ))
                }
            }
            Err(err) => Err(format!("failed to send {amount} to {destination}: {err:#}")),
        };

        match preimage {
            Ok(preimage) => {
                let returned = hex::encode(preimage);
                let (peer, failure) = {
                    let mut tracked = shared.lock().expect("deal mutex poisoned");
                    if tracked.deal().state != SwapState::Active {
                        tracing::warn!(
                            r_hash = %body.r_hash,
                            "deal left active while the payment was in flight"
                        );
                        return Ok(());
                    }
                    if tracked.deal().r_preimage.as_deref() == Some(returned.as_str()) {
                        tracked.set_phase(SwapPhase::SwapCompleted, &self.events);
                        (tracked.peer(), None)
                    } else {
                        let reason = format!(
                            "payment preimage does not match the payment hash {}",
                            body.r_hash
                        );
                        tracked.set_error(&reason, &self.events);
                        (tracked.peer(), Some(reason))
                    }
                };
                match failure {
                    None => {
                        let complete =
                            Packet::notification(PacketBody::SwapComplete(SwapCompleteBody {
                                r_hash: body.r_hash.clone(),
                            }));
                        if let Err(err) = peer.send_packet(complete).await {
                            tracing::warn!(
                                r_hash = %body.r_hash,
                                error = %format!("{err:#}"),
                                "failed to send swap complete packet"
                            );
                        }
                    }
                    Some(reason) => {
                        self.send_swap_error(peer, body.r_hash.clone(), reason, None)
                            .await;
                    }
                }
            }
            Err(reason) => {
                let peer = {
                    let mut tracked = shared.lock().expect("deal mutex poisoned");
                    tracked.set_error(&reason, &self.events);
                    tracked.peer()
                };
                self.send_swap_error(peer, body.r_hash.clone(), reason, None)
                    .await;
            }
        }

        Ok(())
    }

    /// Accepts (or rejects) an inbound swap request as the maker. On
    /// acceptance the maker-to-taker routes and the scaled maker-leg timelock
    /// are stored on the deal, a swap response goes back referencing the
    /// request id, and the deal advances to `SwapAgreed`. Returns whether the
    /// deal was accepted; every rejection path notifies the peer.
    pub async fn accept_deal(
        &self,
        order: &OrderToAccept,
        packet: &Packet,
        peer: Arc<dyn Peer>,
    ) -> bool {
        let PacketBody::SwapRequest(body) = &packet.body else {
            tracing::warn!("accept_deal invoked with a packet that is not a swap request");
            return false;
        };
        let request_id = packet.id;
        let r_hash = body.r_hash.clone();
        tracing::debug!(
            r_hash = %r_hash,
            peer = %peer.node_pub_key(),
            pair_id = %body.pair_id,
            "handling swap request"
        );

        let taker_pub_key = peer.chain_pub_key(body.taker_currency);
        let deal = SwapDeal {
            r_hash: r_hash.clone(),
            r_preimage: None,
            role: SwapRole::Maker,
            phase: SwapPhase::SwapCreated,
            state: SwapState::Active,
            state_reason: String::new(),
            peer_pub_key: peer.node_pub_key().to_string(),
            order_id: body.order_id.clone(),
            local_order_id: order.local_id.clone(),
            pair_id: body.pair_id.clone(),
            price: order.price,
            taker_currency: body.taker_currency,
            maker_currency: body.maker_currency,
            taker_amount: body.taker_amount,
            maker_amount: body.maker_amount,
            taker_cltv_delta: body.taker_cltv_delta,
            maker_cltv_delta: 0,
            proposed_quantity: body.proposed_quantity,
            quantity: Some(order.quantity_to_accept),
            maker_to_taker_routes: None,
            taker_pub_key: taker_pub_key.clone(),
            create_time: unix_time_secs(),
            execute_time: None,
            completion_time: None,
        };

        let (tracked, _completion) = TrackedDeal::new(deal, peer.clone());
        let shared = match self.registry.add(tracked) {
            Ok(shared) => shared,
            Err(err) => {
                // The original deal under this hash stays untouched.
                let reason = format!("{err:#}");
                tracing::warn!(r_hash = %r_hash, reason = %reason, "rejecting swap request");
                self.send_swap_error(peer, r_hash, reason, Some(request_id))
                    .await;
                return false;
            }
        };

        let quantity = order.quantity_to_accept;
        if quantity <= 0.0 || quantity > body.proposed_quantity {
            let reason = format!(
                "accepted quantity {quantity} is outside (0, {}]",
                body.proposed_quantity
            );
            self.fail_deal(&shared, &reason, Some(request_id)).await;
            return false;
        }
        if quantity < body.proposed_quantity {
            let reason = format!(
                "partial acceptance of {quantity} out of {} is not supported",
                body.proposed_quantity
            );
            self.fail_deal(&shared, &reason, Some(request_id)).await;
            return false;
        }

        if let Err(err) = self.verify_setup(peer.as_ref(), body.taker_currency, body.maker_currency)
        {
            self.fail_deal(&shared, &format!("{err:#}"), Some(request_id))
                .await;
            return false;
        }

        let taker_client = match self.clients.require(body.taker_currency) {
            Ok(client) => client,
            Err(err) => {
                self.fail_deal(&shared, &format!("{err:#}"), Some(request_id))
                    .await;
                return false;
            }
        };
        let Some(destination) = taker_pub_key else {
            let reason = format!(
                "peer {} did not advertise a {} chain pubkey",
                peer.node_pub_key(),
                body.taker_currency
            );
            self.fail_deal(&shared, &reason, Some(request_id)).await;
            return false;
        };

        let routes = match taker_client
            .query_routes(body.taker_amount, body.taker_cltv_delta, 1, &destination)
            .await
        {
            Ok(routes) => routes,
            Err(err) => {
                let reason = format!("unable to find route to destination: {err:#}");
                self.fail_deal(&shared, &reason, Some(request_id)).await;
                return false;
            }
        };
        let Some(total_timelock) = routes.first().map(|route| route.total_timelock) else {
            self.fail_deal(&shared, "unable to find route to destination", Some(request_id))
                .await;
            return false;
        };

        let height = match taker_client.get_info().await {
            Ok(info) => info.block_height,
            Err(err) => {
                let reason = format!("unable to fetch chain height: {err:#}");
                self.fail_deal(&shared, &reason, Some(request_id)).await;
                return false;
            }
        };
        tracing::debug!(r_hash = %r_hash, total_timelock, height, "found route to taker");

        let maker_client = match self.clients.require(body.maker_currency) {
            Ok(client) => client,
            Err(err) => {
                self.fail_deal(&shared, &format!("{err:#}"), Some(request_id))
                    .await;
                return false;
            }
        };

        // Observed end-to-end timelock of the taker leg, scaled into
        // maker-chain blocks. The configured final-hop deltas stand in for
        // the relative block rates of the two chains.
        let route_cltv_delta = total_timelock.saturating_sub(height);
        let maker_cltv_delta = cltv::scale_route_cltv(
            route_cltv_delta,
            f64::from(taker_client.cltv_delta()),
            f64::from(maker_client.cltv_delta()),
            maker_client.cltv_delta(),
        );

        {
            let mut tracked = shared.lock().expect("deal mutex poisoned");
            tracked.deal_mut().maker_to_taker_routes = Some(routes);
            tracked.deal_mut().maker_cltv_delta = maker_cltv_delta;
        }

        let response = Packet::response(
            request_id,
            PacketBody::SwapResponse(SwapResponseBody {
                r_hash: r_hash.clone(),
                quantity: Some(body.proposed_quantity),
                maker_cltv_delta: Some(maker_cltv_delta),
                rejection_reason: None,
            }),
        );
        if let Err(err) = peer.send_packet(response).await {
            let reason = format!("failed to send swap response: {err:#}");
            shared
                .lock()
                .expect("deal mutex poisoned")
                .set_error(&reason, &self.events);
            return false;
        }

        shared
            .lock()
            .expect("deal mutex poisoned")
            .set_phase(SwapPhase::SwapAgreed, &self.events);
        true
    }

    /// Resolves an inbound HTLC held pending by a chain client. Validates the
    /// incoming amount and timelock against the deal, then either forwards
    /// payment on the other chain to learn the preimage (maker) or releases
    /// the stored preimage (taker). The returned value (or the error's
    /// message) goes back to the chain client, which settles or cancels the
    /// held HTLC accordingly.
    pub async fn resolve_hash(&self, request: &ResolveRequest) -> Result<String> {
        let Some(shared) = self.registry.get(&request.r_hash) else {
            anyhow::bail!("could not find swap deal for payment hash {}", request.r_hash);
        };

        let role = {
            let mut tracked = shared.lock().expect("deal mutex poisoned");
            let role = tracked.deal().role;

            let expected_msat = match role {
                SwapRole::Maker => tracked.deal().maker_amount,
                SwapRole::Taker => tracked.deal().taker_amount,
            } * 1000;
            if request.amount_msat < expected_msat {
                let reason = format!(
                    "incoming amount of {} msat is less than the expected {expected_msat} msat",
                    request.amount_msat
                );
                tracked.set_error(&reason, &self.events);
                anyhow::bail!(reason);
            }

            let required_delta = match role {
                SwapRole::Maker => tracked.deal().maker_cltv_delta,
                SwapRole::Taker => tracked.deal().taker_cltv_delta,
            };
            let remaining = request.timeout_height.saturating_sub(request.height_now);
            if remaining < required_delta {
                let reason = format!(
                    "incoming htlc expires in {remaining} blocks, below the required \
                     {required_delta} block delta"
                );
                tracked.set_error(&reason, &self.events);
                anyhow::bail!(reason);
            }

            role
        };

        match role {
            SwapRole::Maker => self.forward_as_maker(&shared).await,
            SwapRole::Taker => {
                // The maker has already learned the preimage on its leg;
                // releasing ours settles the incoming amount.
                let mut tracked = shared.lock().expect("deal mutex poisoned");
                tracked.set_phase(SwapPhase::AmountReceived, &self.events);
                tracked
                    .deal()
                    .r_preimage
                    .clone()
                    .context("taker deal is missing its preimage")
            }
        }
    }

    /// Inbound notification that the peer's side finished. Unknown hashes and
    /// duplicate or out-of-order notifications are logged and absorbed; only a
    /// deal awaiting completion is advanced.
    pub fn handle_swap_complete(&self, body: &SwapCompleteBody) {
        let Some(shared) = self.registry.get(&body.r_hash) else {
            tracing::debug!(r_hash = %body.r_hash, "swap complete for unknown deal");
            return;
        };
        let mut tracked = shared.lock().expect("deal mutex poisoned");
        let (state, phase) = (tracked.deal().state, tracked.deal().phase);
        if state != SwapState::Active || phase != SwapPhase::AmountReceived {
            tracing::debug!(
                r_hash = %body.r_hash,
                state = ?state,
                phase = ?phase,
                "ignoring swap complete for a deal that is not awaiting completion"
            );
            return;
        }
        tracked.set_phase(SwapPhase::SwapCompleted, &self.events);
    }

    /// Inbound notification that the peer failed the deal. Unknown hashes and
    /// errors for already-completed deals are logged and absorbed; errors on a
    /// failed deal still append to its reason.
    pub fn handle_swap_error(&self, body: &SwapErrorBody) {
        let Some(shared) = self.registry.get(&body.r_hash) else {
            tracing::debug!(
                r_hash = %body.r_hash,
                error = %body.error_message,
                "swap error for unknown deal"
            );
            return;
        };
        let mut tracked = shared.lock().expect("deal mutex poisoned");
        if tracked.deal().state == SwapState::Completed {
            tracing::debug!(
                r_hash = %body.r_hash,
                error = %body.error_message,
                "ignoring swap error for a completed deal"
            );
            return;
        }
        tracked.set_error(&body.error_message, &self.events);
    }

    /// Requires the peer to have advertised a chain pubkey for both swap
    /// currencies and both local chain clients to be connected.
    fn verify_setup(
        &self,
        peer: &dyn Peer,
        taker_currency: Currency,
        maker_currency: Currency,
    ) -> Result<()> {
        for currency in [taker_currency, maker_currency] {
            anyhow::ensure!(
                peer.chain_pub_key(currency).is_some(),
                "peer {} did not advertise a {currency} chain pubkey",
                peer.node_pub_key()
            );
            anyhow::ensure!(
                self.clients.is_connected(currency),
                "{currency} chain client is not connected"
            );
        }
        Ok(())
    }

    /// Subunit amounts for the base and quote legs of a fill at `quantity`
    /// base units and `price` quote-per-base.
    fn swap_amounts(
        &self,
        quantity: f64,
        price: f64,
        base: Currency,
        quote: Currency,
    ) -> Result<(u64, u64)> {
        let base_config = self.clients.config(base)?;
        let quote_config = self.clients.config(quote)?;
        let base_amount = (quantity * base_config.subunits_per_unit).round() as u64;
        let quote_amount = (quantity * price * quote_config.subunits_per_unit).round() as u64;
        Ok((base_amount, quote_amount))
    }

    /// Validates a swap response and prepares the taker's payment on the
    /// maker currency. Records the maker-leg timelock and the accepted
    /// quantity; a quantity below the proposal is refused rather than
    /// recomputing amounts.
    fn prepare_taker_send(
        &self,
        tracked: &mut TrackedDeal,
        body: &SwapResponseBody,
    ) -> Result<(Arc<dyn ChainClient>, SendPaymentRequest)> {
        let maker_cltv_delta = body
            .maker_cltv_delta
            .context("swap response is missing a maker cltv delta")?;
        tracked.deal_mut().maker_cltv_delta = maker_cltv_delta;

        if let Some(quantity) = body.quantity {
            let proposed = tracked.deal().proposed_quantity;
            anyhow::ensure!(
                quantity > 0.0 && quantity <= proposed,
                "response quantity {quantity} is outside (0, {proposed}]"
            );
            anyhow::ensure!(
                quantity >= proposed,
                "partial acceptance of {quantity} out of {proposed} is not supported"
            );
            tracked.deal_mut().quantity = Some(quantity);
        }

        let maker_currency = tracked.deal().maker_currency;
        let client = self.clients.require(maker_currency)?;
        let destination = tracked
            .peer()
            .chain_pub_key(maker_currency)
            .with_context(|| {
                format!(
                    "peer {} did not advertise a {maker_currency} chain pubkey",
                    tracked.deal().peer_pub_key
                )
            })?;

        let deal = tracked.deal();
        Ok((
            client,
            SendPaymentRequest {
                amount: deal.maker_amount,
                destination,
                payment_hash: deal.r_hash.clone(),
                final_cltv_delta: maker_cltv_delta,
            },
        ))
    }

    /// Maker-side resolution: pay the taker along the stored routes and hand
    /// the learned preimage back to the chain client holding our incoming
    /// HTLC.
    async fn forward_as_maker(&self, shared: &SharedDeal) -> Result<String> {
        let (client, routes, r_hash) = {
            let mut tracked = shared.lock().expect("deal mutex poisoned");
            let taker_currency = tracked.deal().taker_currency;
            let client = match self.clients.require(taker_currency) {
                Ok(client) => client,
                Err(err) => {
                    let reason = format!("{err:#}");
                    tracked.set_error(&reason, &self.events);
                    anyhow::bail!(reason);
                }
            };
            let Some(routes) = tracked.deal().maker_to_taker_routes.clone() else {
                let reason = "no routes to pay the taker were stored".to_string();
                tracked.set_error(&reason, &self.events);
                anyhow::bail!(reason);
            };
            let r_hash = tracked.deal().r_hash.clone();
            tracked.set_phase(SwapPhase::AmountSent, &self.events);
            (client, routes, r_hash)
        };

        let sent = client.send_to_route_sync(&routes, &r_hash).await;
        let preimage = match sent {
            Ok(result) => {
                if let Some(err) = result.payment_error {
                    Err(format!("got a payment error paying the taker: {err}"))
                } else if let Some(preimage) = result.payment_preimage {
                    Ok(preimage)
                } else {
                    Err("taker payment settled without returning a preimage".to_string())
                }
            }
            Err(err) => Err(format!("failed to pay the taker: {err:#}")),
        };

        match preimage {
            Ok(preimage) => {
                let preimage_hex = hex::encode(preimage);
                let mut tracked = shared.lock().expect("deal mutex poisoned");
                tracked.deal_mut().r_preimage = Some(preimage_hex.clone());
                tracked.set_phase(SwapPhase::AmountReceived, &self.events);
                Ok(preimage_hex)
            }
            Err(reason) => {
                shared
                    .lock()
                    .expect("deal mutex poisoned")
                    .set_error(&reason, &self.events);
                anyhow::bail!(reason);
            }
        }
    }

    /// Fails a deal and notifies its peer with a swap error packet.
    async fn fail_deal(&self, shared: &SharedDeal, reason: &str, res_id: Option<Uuid>) {
        let (peer, r_hash) = {
            let mut tracked = shared.lock().expect("deal mutex poisoned");
            tracked.set_error(reason, &self.events);
            (tracked.peer(), tracked.deal().r_hash.clone())
        };
        self.send_swap_error(peer, r_hash, reason.to_string(), res_id)
            .await;
    }

    async fn send_swap_error(
        &self,
        peer: Arc<dyn Peer>,
        r_hash: String,
        error_message: String,
        res_id: Option<Uuid>,
    ) {
        let body = PacketBody::SwapError(SwapErrorBody {
            r_hash,
            error_message,
        });
        let packet = match res_id {
            Some(id) => Packet::response(id, body),
            None => Packet::notification(body),
        };
        if let Err(err) = peer.send_packet(packet).await {
            tracing::warn!(error = %format!("{err:#}"), "failed to send swap error packet");
        }
    }
}
