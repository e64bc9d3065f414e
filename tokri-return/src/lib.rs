pub mod manager;
pub mod models;
pub mod repository;

pub use manager::{ReturnError, ReturnManager};
pub use models::{NewReturn, RefundType, ReturnItem, ReturnItemDraft, ReturnRequest, ReturnStatus};
pub use repository::ReturnRepository;
