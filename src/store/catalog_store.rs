use std::collections::HashMap;

use parking_lot::RwLock;

use crate::catalog::CatalogSeed;
use crate::domain::{CatalogRepository, CoinPlan, Gift, MessageCosts, PayoutSlab};

#[derive(Debug)]
pub struct InMemoryCatalogStore {
    plans: RwLock<HashMap<String, CoinPlan>>,
    slabs: RwLock<Vec<PayoutSlab>>,
    message_costs: RwLock<MessageCosts>,
    gifts: RwLock<HashMap<String, Gift>>,
}

impl InMemoryCatalogStore {
    /// Loads the seed as-is; callers validate through `PricingCatalog::validate_seed`.
    pub fn new(seed: CatalogSeed) -> Self {
        Self {
            plans: RwLock::new(seed.plans.into_iter().map(|p| (p.id.clone(), p)).collect()),
            slabs: RwLock::new(seed.slabs),
            message_costs: RwLock::new(seed.message_costs),
            gifts: RwLock::new(seed.gifts.into_iter().map(|g| (g.id.clone(), g)).collect()),
        }
    }
}

impl CatalogRepository for InMemoryCatalogStore {
    fn plans(&self) -> Vec<CoinPlan> {
        self.plans.read().values().cloned().collect()
    }

    fn upsert_plan(&self, plan: CoinPlan) {
        self.plans.write().insert(plan.id.clone(), plan);
    }

    fn remove_plan(&self, id: &str) -> Option<CoinPlan> {
        self.plans.write().remove(id)
    }

    fn slabs(&self) -> Vec<PayoutSlab> {
        self.slabs.read().clone()
    }

    fn replace_slabs(&self, slabs: Vec<PayoutSlab>) {
        *self.slabs.write() = slabs;
    }

    fn message_costs(&self) -> MessageCosts {
        self.message_costs.read().clone()
    }

    fn set_message_costs(&self, costs: MessageCosts) {
        *self.message_costs.write() = costs;
    }

    fn gift(&self, id: &str) -> Option<Gift> {
        self.gifts.read().get(id).cloned()
    }

    fn gifts(&self) -> Vec<Gift> {
        let mut gifts: Vec<Gift> = self.gifts.read().values().cloned().collect();
        gifts.sort_by(|a, b| a.id.cmp(&b.id));
        gifts
    }

    fn upsert_gift(&self, gift: Gift) {
        self.gifts.write().insert(gift.id.clone(), gift);
    }
}
