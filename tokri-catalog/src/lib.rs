pub mod coupon;
pub mod inventory;

pub use coupon::{Coupon, CouponMint, CouponRepository, CouponError};
pub use inventory::{StockLedger, StockRepository};
