//! Pricing reference data: coin plans, payout slabs, message costs and gifts.
//!
//! Plans and slabs are read on hot paths and served from a short-TTL cache.
//! Every admin write validates first, persists, and drops the cache before it
//! returns, all while holding `refresh` exclusively so no reader can put a
//! pre-write snapshot back into the cache.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::domain::{
    Actor, AdminId, AuditAction, AuditLog, CatalogRepository, CoinPlan, Coins, Error, Gift, Inr,
    MessageCosts, NewAuditEntry, PayoutSlab, Result, Tier,
};
use crate::logging::ALERT_TARGET;
use crate::slabs::PayoutSlabResolver;

const PLANS_KEY: &str = "active_plans";
const SLABS_KEY: &str = "slabs";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSeed {
    pub plans: Vec<CoinPlan>,
    pub slabs: Vec<PayoutSlab>,
    pub message_costs: MessageCosts,
    pub gifts: Vec<Gift>,
}

impl CatalogSeed {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("catalog {}: {}", path.display(), e)))
    }
}

impl Default for CatalogSeed {
    fn default() -> Self {
        let plan = |id: &str, tier, rupees, base, bonus, order| CoinPlan {
            id: id.to_string(),
            tier,
            price_in_inr: Inr(rupees * Inr::SCALE),
            base_coins: base,
            bonus_coins: bonus,
            total_coins: base + bonus,
            is_active: true,
            display_order: order,
        };
        let slab = |id: &str, min, max, pct: i64, order| PayoutSlab {
            id: id.to_string(),
            min_coins: min,
            max_coins: max,
            payout_percentage: Decimal::from(pct),
            display_order: order,
        };
        let gift = |id: &str, name: &str, cost, trade_value| Gift {
            id: id.to_string(),
            name: name.to_string(),
            cost,
            trade_value,
            is_active: true,
        };

        Self {
            plans: vec![
                plan("basic_pack", Tier::Basic, 99, 100, 0, 1),
                plan("silver_pack", Tier::Silver, 499, 500, 50, 2),
                plan("gold_pack", Tier::Gold, 999, 1_000, 200, 3),
                plan("platinum_pack", Tier::Platinum, 4_999, 5_000, 1_500, 4),
            ],
            slabs: vec![
                slab("starter", 0, Some(999), 50, 1),
                slab("regular", 1_000, Some(4_999), 60, 2),
                slab("premium", 5_000, None, 70, 3),
            ],
            message_costs: MessageCosts {
                per_tier: BTreeMap::from([
                    (Tier::Basic, 10),
                    (Tier::Silver, 15),
                    (Tier::Gold, 20),
                    (Tier::Platinum, 25),
                ]),
                video_call: 50,
                earning_percentage: Decimal::from(50),
            },
            gifts: vec![
                gift("rose", "Rose", 20, 10),
                gift("teddy", "Teddy Bear", 100, 60),
                gift("ring", "Diamond Ring", 500, 350),
            ],
        }
    }
}

pub struct PricingCatalog {
    repo: Arc<dyn CatalogRepository>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    plans: Cache<String, Arc<Vec<CoinPlan>>>,
    slabs: Cache<String, Arc<PayoutSlabResolver>>,
    refresh: RwLock<()>,
}

impl PricingCatalog {
    pub fn new(
        repo: Arc<dyn CatalogRepository>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            audit,
            clock,
            plans: Cache::builder()
                .max_capacity(1)
                .time_to_live(cache_ttl)
                .build(),
            slabs: Cache::builder()
                .max_capacity(1)
                .time_to_live(cache_ttl)
                .build(),
            refresh: RwLock::new(()),
        }
    }

    /// Checks every seeded entry the same way an admin write would be checked.
    pub fn validate_seed(seed: &CatalogSeed) -> Result<()> {
        for plan in &seed.plans {
            plan.validate()?;
        }
        PayoutSlabResolver::new(seed.slabs.clone())?;
        seed.message_costs.validate()?;
        for gift in &seed.gifts {
            gift.validate()?;
        }
        Ok(())
    }

    /// Active plans ordered by `display_order`.
    pub async fn get_active_plans(&self) -> Vec<CoinPlan> {
        if let Some(plans) = self.plans.get(PLANS_KEY).await {
            return plans.as_ref().clone();
        }

        let _guard = self.refresh.read().await;
        let mut plans: Vec<CoinPlan> = self
            .repo
            .plans()
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        plans.sort_by(|a, b| (a.display_order, &a.id).cmp(&(b.display_order, &b.id)));
        let plans = Arc::new(plans);
        self.plans.insert(PLANS_KEY.to_string(), plans.clone()).await;
        plans.as_ref().clone()
    }

    pub async fn get_active_plan(&self, plan_id: &str) -> Result<CoinPlan> {
        self.get_active_plans()
            .await
            .into_iter()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| Error::UnknownPlan(plan_id.to_string()))
    }

    pub fn get_message_costs(&self) -> MessageCosts {
        self.repo.message_costs()
    }

    pub fn get_message_cost(&self, tier: Tier) -> Result<Coins> {
        self.repo.message_costs().cost_for(tier)
    }

    pub fn get_video_call_cost(&self) -> Coins {
        self.repo.message_costs().video_call
    }

    pub fn get_gift(&self, gift_id: &str) -> Result<Gift> {
        self.repo
            .gift(gift_id)
            .filter(|g| g.is_active)
            .ok_or_else(|| Error::UnknownGift(gift_id.to_string()))
    }

    pub fn get_gift_trade_value(&self, gift_id: &str) -> Result<Coins> {
        self.get_gift(gift_id).map(|g| g.trade_value)
    }

    pub fn gifts(&self) -> Vec<Gift> {
        self.repo.gifts()
    }

    pub async fn slab_resolver(&self) -> Result<Arc<PayoutSlabResolver>> {
        if let Some(resolver) = self.slabs.get(SLABS_KEY).await {
            return Ok(resolver);
        }

        let _guard = self.refresh.read().await;
        let resolver = Arc::new(PayoutSlabResolver::new(self.repo.slabs()).inspect_err(|e| {
            tracing::error!(target: ALERT_TARGET, error = %e, "stored payout slabs are invalid");
        })?);
        self.slabs
            .insert(SLABS_KEY.to_string(), resolver.clone())
            .await;
        Ok(resolver)
    }

    /// Payout percentage for a withdrawal of `coins`. Never defaults on a miss.
    pub async fn resolve_payout(&self, coins: Coins) -> Result<Decimal> {
        self.slab_resolver()
            .await?
            .resolve(coins)
            .inspect_err(|e| {
                tracing::error!(
                    target: ALERT_TARGET,
                    coins,
                    error = %e,
                    "payout slab lookup failed"
                );
            })
    }

    pub async fn save_plan(&self, admin_id: AdminId, plan: CoinPlan) -> Result<CoinPlan> {
        plan.validate()?;

        let _guard = self.refresh.write().await;
        self.repo.upsert_plan(plan.clone());
        self.plans.invalidate(PLANS_KEY).await;
        self.record(
            admin_id,
            AuditAction::PlanSaved,
            format!("plan:{}", plan.id),
            Some(format!(
                "{} coins for {} INR, active={}",
                plan.total_coins, plan.price_in_inr, plan.is_active
            )),
        )?;
        Ok(plan)
    }

    pub async fn delete_plan(&self, admin_id: AdminId, plan_id: &str) -> Result<CoinPlan> {
        let _guard = self.refresh.write().await;
        let removed = self
            .repo
            .remove_plan(plan_id)
            .ok_or_else(|| Error::UnknownPlan(plan_id.to_string()))?;
        self.plans.invalidate(PLANS_KEY).await;
        self.record(
            admin_id,
            AuditAction::PlanDeleted,
            format!("plan:{}", plan_id),
            None,
        )?;
        Ok(removed)
    }

    /// Adds `slab`, or replaces the slab with the same id, if the resulting set stays contiguous.
    pub async fn save_slab(&self, admin_id: AdminId, slab: PayoutSlab) -> Result<()> {
        let _guard = self.refresh.write().await;
        let mut slabs = self.repo.slabs();
        let detail = format!("saved {}", slab);
        match slabs.iter_mut().find(|s| s.id == slab.id) {
            Some(existing) => *existing = slab,
            None => slabs.push(slab),
        }
        self.commit_slabs(admin_id, slabs, detail).await
    }

    pub async fn delete_slab(&self, admin_id: AdminId, slab_id: &str) -> Result<()> {
        let _guard = self.refresh.write().await;
        let mut slabs = self.repo.slabs();
        let before = slabs.len();
        slabs.retain(|s| s.id != slab_id);
        if slabs.len() == before {
            return Err(Error::Validation(format!("slab {} does not exist", slab_id)));
        }
        self.commit_slabs(admin_id, slabs, format!("deleted {}", slab_id))
            .await
    }

    pub async fn replace_slabs(&self, admin_id: AdminId, slabs: Vec<PayoutSlab>) -> Result<()> {
        let _guard = self.refresh.write().await;
        let detail = format!("replaced with {} slabs", slabs.len());
        self.commit_slabs(admin_id, slabs, detail).await
    }

    /// Caller holds `refresh` for writing.
    async fn commit_slabs(
        &self,
        admin_id: AdminId,
        slabs: Vec<PayoutSlab>,
        detail: String,
    ) -> Result<()> {
        let resolver = PayoutSlabResolver::new(slabs).inspect_err(|e| {
            tracing::warn!(admin_id, error = %e, "rejected payout slab change");
        })?;
        self.repo.replace_slabs(resolver.slabs().to_vec());
        self.slabs.invalidate(SLABS_KEY).await;
        self.record(
            admin_id,
            AuditAction::SlabsChanged,
            "slabs".to_string(),
            Some(detail),
        )?;
        Ok(())
    }

    pub async fn set_message_costs(&self, admin_id: AdminId, costs: MessageCosts) -> Result<()> {
        costs.validate()?;
        let _guard = self.refresh.write().await;
        let detail = format!(
            "video_call={}, earning={}%",
            costs.video_call, costs.earning_percentage
        );
        self.repo.set_message_costs(costs);
        self.record(
            admin_id,
            AuditAction::MessageCostsChanged,
            "message_costs".to_string(),
            Some(detail),
        )?;
        Ok(())
    }

    pub async fn save_gift(&self, admin_id: AdminId, gift: Gift) -> Result<Gift> {
        gift.validate()?;
        let _guard = self.refresh.write().await;
        self.repo.upsert_gift(gift.clone());
        self.record(
            admin_id,
            AuditAction::GiftSaved,
            format!("gift:{}", gift.id),
            Some(format!("cost={}, trade_value={}", gift.cost, gift.trade_value)),
        )?;
        Ok(gift)
    }

    fn record(
        &self,
        admin_id: AdminId,
        action: AuditAction,
        target: String,
        detail: Option<String>,
    ) -> Result<()> {
        self.audit.append(NewAuditEntry {
            actor: Actor::Admin(admin_id),
            action,
            target,
            detail,
            at: self.clock.now(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::{InMemoryAuditLog, InMemoryCatalogStore};

    fn catalog() -> (PricingCatalog, Arc<InMemoryAuditLog>) {
        let audit = Arc::new(InMemoryAuditLog::new());
        let catalog = PricingCatalog::new(
            Arc::new(InMemoryCatalogStore::new(CatalogSeed::default())),
            audit.clone(),
            Arc::new(SystemClock),
            Duration::from_secs(60),
        );
        (catalog, audit)
    }

    #[test]
    fn default_seed_is_valid() {
        assert!(PricingCatalog::validate_seed(&CatalogSeed::default()).is_ok());
    }

    #[tokio::test]
    async fn active_plans_are_ordered_and_filtered() {
        let (catalog, _) = catalog();
        let mut basic = catalog.get_active_plan("basic_pack").await.unwrap();
        basic.is_active = false;
        catalog.save_plan(1, basic).await.unwrap();

        let ids: Vec<String> = catalog
            .get_active_plans()
            .await
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["silver_pack", "gold_pack", "platinum_pack"]);
        assert!(matches!(
            catalog.get_active_plan("basic_pack").await,
            Err(Error::UnknownPlan(_))
        ));
    }

    #[tokio::test]
    async fn plan_with_wrong_total_is_not_saved() {
        let (catalog, audit) = catalog();
        let mut plan = catalog.get_active_plan("gold_pack").await.unwrap();
        plan.bonus_coins = 300;

        assert!(matches!(
            catalog.save_plan(1, plan).await,
            Err(Error::Validation(_))
        ));
        let gold = catalog.get_active_plan("gold_pack").await.unwrap();
        assert_eq!(gold.total_coins, 1_200);
        assert!(audit.entries().is_empty());
    }

    #[tokio::test]
    async fn slab_edit_is_visible_immediately() {
        let (catalog, audit) = catalog();
        assert_eq!(catalog.resolve_payout(1_000).await.unwrap(), Decimal::from(60));

        let mut regular = catalog.slab_resolver().await.unwrap().slabs()[1].clone();
        regular.payout_percentage = Decimal::from(65);
        catalog.save_slab(9, regular).await.unwrap();

        assert_eq!(catalog.resolve_payout(1_000).await.unwrap(), Decimal::from(65));
        assert_eq!(audit.for_target("slabs").len(), 1);
    }

    #[tokio::test]
    async fn slab_edit_that_breaks_contiguity_is_rejected() {
        let (catalog, _) = catalog();
        assert!(matches!(
            catalog.delete_slab(9, "regular").await,
            Err(Error::SlabGap(_))
        ));

        let overlapping = PayoutSlab {
            id: "promo".to_string(),
            min_coins: 800,
            max_coins: Some(1_200),
            payout_percentage: Decimal::from(80),
            display_order: 9,
        };
        assert!(matches!(
            catalog.save_slab(9, overlapping).await,
            Err(Error::OverlappingSlabs(_))
        ));
        assert_eq!(catalog.resolve_payout(900).await.unwrap(), Decimal::from(50));
    }

    #[tokio::test]
    async fn unknown_references() {
        let (catalog, _) = catalog();
        assert_eq!(catalog.get_gift_trade_value("teddy").unwrap(), 60);
        assert!(matches!(
            catalog.get_gift_trade_value("yacht"),
            Err(Error::UnknownGift(_))
        ));
        assert_eq!(catalog.get_message_cost(Tier::Gold).unwrap(), 20);
    }
}
