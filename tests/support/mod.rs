use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use ln_cross_swap::chain::{
    ChainClient, ChainClientMap, ChainInfo, Currency, PaymentResult, ResolveRequest, Route,
    SendPaymentRequest,
};
use ln_cross_swap::p2p::{Packet, Peer};
use ln_cross_swap::swap::{MakerOrder, SwapEvent, SwapManager, TakerOrder};

/// Parameters of the inbound HTLC a stub simulates against the coordinator
/// while an outbound payment is in flight.
struct ResolveOnSend {
    manager: Arc<SwapManager>,
    amount_msat: u64,
    timeout_height: u32,
    height_now: u32,
}

/// In-memory chain client. Route queries, height, and payment results are
/// configurable; a payment can be wired to feed the held-HTLC resolver first,
/// the way a real swap interleaves the two legs.
pub struct StubChainClient {
    currency: Currency,
    cltv_delta: u32,
    connected: Mutex<bool>,
    routes: Mutex<Vec<Route>>,
    block_height: Mutex<u32>,
    info_error: Mutex<Option<String>>,
    payment_preimage: Mutex<Option<[u8; 32]>>,
    payment_error: Mutex<Option<String>>,
    resolve_on_send: Mutex<Option<ResolveOnSend>>,
    sent_payments: Mutex<Vec<SendPaymentRequest>>,
}

impl StubChainClient {
    pub fn new(currency: Currency, cltv_delta: u32) -> Self {
        Self {
            currency,
            cltv_delta,
            connected: Mutex::new(true),
            routes: Mutex::new(Vec::new()),
            block_height: Mutex::new(0),
            info_error: Mutex::new(None),
            payment_preimage: Mutex::new(None),
            payment_error: Mutex::new(None),
            resolve_on_send: Mutex::new(None),
            sent_payments: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        *self.connected.lock().unwrap() = connected;
    }

    pub fn set_routes(&self, routes: Vec<Route>) {
        *self.routes.lock().unwrap() = routes;
    }

    pub fn set_block_height(&self, height: u32) {
        *self.block_height.lock().unwrap() = height;
    }

    pub fn set_info_error(&self, message: &str) {
        *self.info_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_payment_preimage(&self, preimage: [u8; 32]) {
        *self.payment_preimage.lock().unwrap() = Some(preimage);
    }

    pub fn set_payment_error(&self, message: &str) {
        *self.payment_error.lock().unwrap() = Some(message.to_string());
    }

    /// Arranges for the next outbound payment to first invoke the
    /// coordinator's resolver, as if the counterparty forwarded our incoming
    /// HTLC while our payment was in flight.
    pub fn resolve_before_settling(
        &self,
        manager: Arc<SwapManager>,
        amount_msat: u64,
        timeout_height: u32,
        height_now: u32,
    ) {
        *self.resolve_on_send.lock().unwrap() = Some(ResolveOnSend {
            manager,
            amount_msat,
            timeout_height,
            height_now,
        });
    }

    pub fn sent_payments(&self) -> Vec<SendPaymentRequest> {
        self.sent_payments.lock().unwrap().clone()
    }

    fn payment_result(&self) -> PaymentResult {
        PaymentResult {
            payment_error: self.payment_error.lock().unwrap().clone(),
            payment_preimage: *self.payment_preimage.lock().unwrap(),
        }
    }

    async fn resolve_pending(&self, payment_hash: &str) -> Result<Option<PaymentResult>> {
        let pending = self.resolve_on_send.lock().unwrap().take();
        let Some(pending) = pending else {
            return Ok(None);
        };

        let preimage_hex = pending
            .manager
            .resolve_hash(&ResolveRequest {
                r_hash: payment_hash.to_string(),
                amount_msat: pending.amount_msat,
                timeout_height: pending.timeout_height,
                height_now: pending.height_now,
            })
            .await
            .context("resolve held htlc")?;
        let preimage: [u8; 32] = hex::decode(preimage_hex)
            .context("decode resolved preimage")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("resolved preimage must be 32 bytes"))?;

        Ok(Some(PaymentResult {
            payment_error: None,
            payment_preimage: Some(preimage),
        }))
    }
}

#[async_trait]
impl ChainClient for StubChainClient {
    fn currency(&self) -> Currency {
        self.currency
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    fn cltv_delta(&self) -> u32 {
        self.cltv_delta
    }

    async fn query_routes(
        &self,
        _amount: u64,
        _final_cltv_delta: u32,
        num_routes: u32,
        _pub_key: &str,
    ) -> Result<Vec<Route>> {
        let routes = self.routes.lock().unwrap().clone();
        Ok(routes.into_iter().take(num_routes as usize).collect())
    }

    async fn get_info(&self) -> Result<ChainInfo> {
        if let Some(message) = self.info_error.lock().unwrap().clone() {
            anyhow::bail!(message);
        }
        Ok(ChainInfo {
            block_height: *self.block_height.lock().unwrap(),
        })
    }

    async fn send_payment_sync(&self, request: SendPaymentRequest) -> Result<PaymentResult> {
        let payment_hash = request.payment_hash.clone();
        self.sent_payments.lock().unwrap().push(request);
        if let Some(result) = self.resolve_pending(&payment_hash).await? {
            return Ok(result);
        }
        Ok(self.payment_result())
    }

    async fn send_to_route_sync(
        &self,
        _routes: &[Route],
        payment_hash: &str,
    ) -> Result<PaymentResult> {
        if let Some(result) = self.resolve_pending(payment_hash).await? {
            return Ok(result);
        }
        Ok(self.payment_result())
    }
}

/// In-memory peer that records every packet sent to it.
pub struct StubPeer {
    node_pub_key: String,
    chain_keys: HashMap<Currency, String>,
    sent: Mutex<Vec<Packet>>,
}

impl StubPeer {
    pub fn new(node_pub_key: &str) -> Self {
        Self {
            node_pub_key: node_pub_key.to_string(),
            chain_keys: HashMap::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chain_key(mut self, currency: Currency, key: &str) -> Self {
        self.chain_keys.insert(currency, key.to_string());
        self
    }

    pub fn sent_packets(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Peer for StubPeer {
    fn node_pub_key(&self) -> &str {
        &self.node_pub_key
    }

    fn chain_pub_key(&self, currency: Currency) -> Option<String> {
        self.chain_keys.get(&currency).cloned()
    }

    async fn send_packet(&self, packet: Packet) -> Result<()> {
        self.sent.lock().unwrap().push(packet);
        Ok(())
    }
}

pub struct Harness {
    pub manager: Arc<SwapManager>,
    pub btc: Arc<StubChainClient>,
    pub ltc: Arc<StubChainClient>,
    pub events: mpsc::UnboundedReceiver<SwapEvent>,
}

/// A coordinator wired to connected BTC (delta 40) and LTC (delta 576) stubs.
pub fn harness() -> Harness {
    ln_cross_swap::logging::init().ok();

    let btc = Arc::new(StubChainClient::new(Currency::Btc, 40));
    let ltc = Arc::new(StubChainClient::new(Currency::Ltc, 576));

    let mut clients = ChainClientMap::new();
    clients.insert(btc.clone());
    clients.insert(ltc.clone());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let manager = Arc::new(SwapManager::new(clients, events_tx));

    Harness {
        manager,
        btc,
        ltc,
        events: events_rx,
    }
}

pub fn connected_peer() -> Arc<StubPeer> {
    Arc::new(
        StubPeer::new("P")
            .with_chain_key(Currency::Btc, "peer-btc-key")
            .with_chain_key(Currency::Ltc, "peer-ltc-key"),
    )
}

pub fn sample_maker_order() -> MakerOrder {
    MakerOrder {
        id: "O1".to_string(),
        pair_id: "LTC/BTC".to_string(),
        price: 0.01,
        peer_pub_key: "P".to_string(),
    }
}

pub fn sample_taker_order() -> TakerOrder {
    TakerOrder {
        local_id: "L1".to_string(),
        quantity: 100_000_000,
        is_buy: true,
    }
}

pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<SwapEvent>) -> Vec<SwapEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
