use std::sync::Arc;

use tokri_core::events::EventBus;
use tokri_courier::gateway::CourierApi;
use tokri_courier::tariff::{TariffRepository, TariffResolver};
use tokri_order::manager::OrderManager;
use tokri_return::manager::ReturnManager;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderManager>,
    pub returns: Arc<ReturnManager>,
    pub tariffs: Arc<TariffResolver>,
    pub tariff_repo: Arc<dyn TariffRepository>,
    pub courier: Arc<dyn CourierApi>,
    pub events: EventBus,
    pub reconcile_batch: u32,
}
