pub mod manager;
pub mod models;
pub mod reconcile;
pub mod repository;

pub use manager::{OrderError, OrderManager};
pub use models::{
    CourierShipment, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingAddress,
};
pub use reconcile::SweepReport;
pub use repository::OrderRepository;
