use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokri_api::{app, worker, AppState};
use tokri_catalog::coupon::{CouponMint, CouponRepository};
use tokri_catalog::inventory::StockRepository;
use tokri_core::activity::ActivityLogRepository;
use tokri_core::events::EventBus;
use tokri_courier::gateway::{CourierApi, SteadfastClient};
use tokri_courier::tariff::{TariffRepository, TariffResolver};
use tokri_order::manager::OrderManager;
use tokri_order::repository::OrderRepository;
use tokri_return::manager::ReturnManager;
use tokri_return::repository::ReturnRepository;
use tokri_store::activity_repo::PgActivityLog;
use tokri_store::coupon_repo::PgCouponRepository;
use tokri_store::order_repo::PgOrderRepository;
use tokri_store::return_repo::PgReturnRepository;
use tokri_store::stock_repo::PgStockRepository;
use tokri_store::tariff_repo::PgTariffRepository;
use tokri_store::{Config, DbClient, MemoryStore};

const COURIER_PARTNER: &str = "steadfast";

struct Backend {
    orders: Arc<dyn OrderRepository>,
    returns: Arc<dyn ReturnRepository>,
    tariffs: Arc<dyn TariffRepository>,
    coupons: Arc<dyn CouponRepository>,
    activity: Arc<dyn ActivityLogRepository>,
    stock: Arc<dyn StockRepository>,
}

async fn connect(config: &Config) -> Backend {
    if config.database.url == "memory" {
        tracing::warn!("Using the in-memory store; data will not survive a restart");
        let store = MemoryStore::new();
        return Backend {
            orders: store.clone(),
            returns: store.clone(),
            tariffs: store.clone(),
            coupons: store.clone(),
            activity: store.clone(),
            stock: store.stock.clone(),
        };
    }

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    Backend {
        orders: Arc::new(PgOrderRepository::new(db.pool.clone())),
        returns: Arc::new(PgReturnRepository::new(db.pool.clone())),
        tariffs: Arc::new(PgTariffRepository::new(db.pool.clone())),
        coupons: Arc::new(PgCouponRepository::new(db.pool.clone())),
        activity: Arc::new(PgActivityLog::new(db.pool.clone())),
        stock: Arc::new(PgStockRepository::new(db.pool.clone())),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokri_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Tokri API on port {}", config.server.port);

    let backend = connect(&config).await;
    let events = EventBus::default();

    let gateway = SteadfastClient::new(&config.courier, backend.activity.clone())
        .expect("Failed to build courier client");
    if !gateway.is_configured() {
        tracing::warn!("Courier credentials absent; dispatch will be refused until configured");
    }
    let courier: Arc<dyn CourierApi> = Arc::new(gateway);

    let orders = Arc::new(OrderManager::new(
        backend.orders.clone(),
        backend.stock.clone(),
        backend.coupons.clone(),
        courier.clone(),
        backend.activity.clone(),
        events.clone(),
        COURIER_PARTNER.to_string(),
    ));
    let returns = Arc::new(ReturnManager::new(
        backend.returns.clone(),
        backend.orders.clone(),
        backend.stock.clone(),
        CouponMint::new(backend.coupons.clone()),
        courier.clone(),
        backend.activity.clone(),
        events.clone(),
        COURIER_PARTNER.to_string(),
        config.returns.window_days,
    ));
    let tariffs = Arc::new(TariffResolver::new(
        backend.tariffs.clone(),
        config.shipping.clone(),
    ));

    tokio::spawn(worker::run_reconciliation_worker(
        orders.clone(),
        config.reconcile.interval_secs,
        config.reconcile.batch_size,
    ));

    let state = AppState {
        orders,
        returns,
        tariffs,
        tariff_repo: backend.tariffs.clone(),
        courier,
        events,
        reconcile_batch: config.reconcile.batch_size,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app(state))
        .await
        .expect("Server error");
}
