pub mod gateway;
pub mod status;
pub mod tariff;

pub use gateway::{
    Balance, CourierApi, CourierConfig, CourierError, Destination, MockCourier, PickupRequest,
    PickupResult, ShipmentRequest, ShipmentResult, SteadfastClient,
};
pub use status::{map_status, FriendlyStatus};
pub use tariff::{CourierTariff, ShippingRates, TariffRepository, TariffResolver};
