use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tokri_catalog::coupon::{Coupon, CouponRepository};
use tokri_catalog::inventory::StockLedger;
use tokri_core::activity::{ActivityEntry, ActivityLogRepository};
use tokri_core::visibility::Party;
use tokri_courier::tariff::{CourierTariff, TariffRepository};
use tokri_order::models::{CourierShipment, Order, OrderStatus};
use tokri_order::repository::OrderRepository;
use tokri_return::models::{ReturnRequest, ReturnStatus};
use tokri_return::repository::ReturnRepository;

/// In-memory implementation of every repository trait. Backs the test
/// suites and the `database.url = "memory"` development mode. Each
/// conditional write checks its precondition under the same lock that
/// applies it, matching the SQL store's write-time guarantees.
#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    returns: Mutex<HashMap<Uuid, ReturnRequest>>,
    tariffs: Mutex<Vec<CourierTariff>>,
    coupons: Mutex<HashMap<String, Coupon>>,
    activity: Mutex<Vec<ActivityEntry>>,
    pub stock: Arc<StockLedger>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Test hook: everything the audit sink has seen so far.
    pub fn activity_entries(&self) -> Vec<ActivityEntry> {
        self.activity.lock().unwrap().clone()
    }

    pub fn coupon(&self, code: &str) -> Option<Coupon> {
        self.coupons.lock().unwrap().get(code).cloned()
    }

    /// Test hook: pre-load a consumed checkout coupon.
    pub fn seed_coupon(&self, coupon: Coupon) {
        self.coupons.lock().unwrap().insert(coupon.code.clone(), coupon);
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.orders.lock().unwrap().insert(order.id, order.clone());
        Ok(())
    }

    async fn fetch(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.customer_id == customer_id && o.visibility.visible_to(viewer))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.orders.lock().unwrap().insert(order.id, order.clone());
        Ok(())
    }

    async fn update_courier(
        &self,
        id: Uuid,
        shipment: &CourierShipment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(&id) {
            order.courier = Some(shipment.clone());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn attach_courier(
        &self,
        id: Uuid,
        shipment: &CourierShipment,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.has_tracking() {
            return Ok(false);
        }
        order.courier = Some(shipment.clone());
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if !from.contains(&order.status) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_outstanding(
        &self,
        limit: u32,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.has_tracking() && !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn purge_hidden(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut orders = self.orders.lock().unwrap();
        let before = orders.len();
        orders.retain(|_, o| !o.visibility.purge_eligible());
        Ok((before - orders.len()) as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.orders.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ReturnRepository for MemoryStore {
    async fn insert(
        &self,
        request: &ReturnRequest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.returns
            .lock()
            .unwrap()
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn fetch(
        &self,
        id: Uuid,
    ) -> Result<Option<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.returns.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>> {
        let mut requests: Vec<ReturnRequest> = self
            .returns
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>> {
        let mut requests: Vec<ReturnRequest> = self
            .returns
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.customer_id == customer_id && r.visibility.visible_to(viewer))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn update(
        &self,
        request: &ReturnRequest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.returns
            .lock()
            .unwrap()
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ReturnStatus],
        to: ReturnStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut returns = self.returns.lock().unwrap();
        let Some(request) = returns.get_mut(&id) else {
            return Ok(false);
        };
        if !from.contains(&request.status) {
            return Ok(false);
        }
        request.status = to;
        request.updated_at = Utc::now();
        Ok(true)
    }

    async fn purge_hidden(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut returns = self.returns.lock().unwrap();
        let before = returns.len();
        returns.retain(|_, r| !r.visibility.purge_eligible());
        Ok((before - returns.len()) as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.returns.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TariffRepository for MemoryStore {
    async fn find_active(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<CourierTariff>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .tariffs
            .lock()
            .unwrap()
            .iter()
            .find(|t| {
                t.active
                    && t.origin_district.eq_ignore_ascii_case(origin)
                    && t.destination_district.eq_ignore_ascii_case(destination)
            })
            .cloned())
    }

    async fn list(
        &self,
    ) -> Result<Vec<CourierTariff>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.tariffs.lock().unwrap().clone())
    }

    async fn upsert(
        &self,
        tariff: &CourierTariff,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut tariffs = self.tariffs.lock().unwrap();
        match tariffs.iter_mut().find(|t| t.id == tariff.id) {
            Some(existing) => *existing = tariff.clone(),
            None => tariffs.push(tariff.clone()),
        }
        Ok(())
    }

    async fn deactivate(
        &self,
        id: Uuid,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut tariffs = self.tariffs.lock().unwrap();
        match tariffs.iter_mut().find(|t| t.id == id) {
            Some(t) => {
                t.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CouponRepository for MemoryStore {
    async fn code_exists(
        &self,
        code: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.coupons.lock().unwrap().contains_key(code))
    }

    async fn insert(
        &self,
        coupon: &Coupon,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.coupons
            .lock()
            .unwrap()
            .insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn release_usage(
        &self,
        code: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(coupon) = self.coupons.lock().unwrap().get_mut(code) {
            coupon.used = false;
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityLogRepository for MemoryStore {
    async fn append(
        &self,
        entry: &ActivityEntry,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.activity.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
