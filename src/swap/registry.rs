use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::TrackedDeal;

pub type SharedDeal = Arc<Mutex<TrackedDeal>>;

/// In-memory mapping from payment hash to deal, the sole authority over deal
/// identity. Deals are kept until process exit; there is no persistence.
#[derive(Default)]
pub struct DealRegistry {
    deals: Mutex<HashMap<String, SharedDeal>>,
}

impl DealRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deal under its payment hash. The hash is chosen by the
    /// taker, so a colliding hash may be a replayed or malicious request and
    /// is rejected rather than overwriting the existing deal.
    pub fn add(&self, tracked: TrackedDeal) -> Result<SharedDeal> {
        let r_hash = tracked.deal().r_hash.clone();
        let mut deals = self.deals.lock().expect("deal registry mutex poisoned");
        anyhow::ensure!(
            !deals.contains_key(&r_hash),
            "deal with payment hash {r_hash} already exists"
        );
        let shared = Arc::new(Mutex::new(tracked));
        deals.insert(r_hash, shared.clone());
        Ok(shared)
    }

    pub fn get(&self, r_hash: &str) -> Option<SharedDeal> {
        self.deals
            .lock()
            .expect("deal registry mutex poisoned")
            .get(r_hash)
            .cloned()
    }

    /// Removes a deal; unknown hashes are ignored.
    pub fn remove(&self, r_hash: &str) {
        self.deals
            .lock()
            .expect("deal registry mutex poisoned")
            .remove(r_hash);
    }
}
