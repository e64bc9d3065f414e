pub mod activity;
pub mod events;
pub mod visibility;

pub use activity::{ActivityEntry, ActivityLogRepository};
pub use events::{DomainEvent, EventBus};
pub use visibility::{Party, Visibility, VisibilityError};
