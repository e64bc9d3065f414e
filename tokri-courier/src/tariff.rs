use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A configured delivery charge for one partner lane. Multiple rows may
/// match a destination; resolution picks the first active match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierTariff {
    pub id: Uuid,
    pub partner: String,
    pub origin_district: String,
    pub destination_district: String,
    pub service_type: String,
    pub category: String,
    pub price: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait TariffRepository: Send + Sync {
    /// First active row matching (origin, destination), if any.
    async fn find_active(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<CourierTariff>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list(
        &self,
    ) -> Result<Vec<CourierTariff>, Box<dyn std::error::Error + Send + Sync>>;

    async fn upsert(
        &self,
        tariff: &CourierTariff,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn deactivate(
        &self,
        id: Uuid,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Fallback charges and the free-shipping override. Injected from
/// configuration; this resolver never hardcodes a business amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingRates {
    pub origin_district: String,
    pub inside_charge: i64,
    pub outside_charge: i64,
    pub free_shipping_enabled: bool,
    pub free_shipping_threshold: i64,
}

pub struct TariffResolver {
    tariffs: Arc<dyn TariffRepository>,
    rates: ShippingRates,
}

impl TariffResolver {
    pub fn new(tariffs: Arc<dyn TariffRepository>, rates: ShippingRates) -> Self {
        Self { tariffs, rates }
    }

    /// Delivery charge for a shipment: tariff row first, configured
    /// defaults second, free-shipping override last.
    pub async fn resolve_charge(
        &self,
        origin: &str,
        destination: &str,
        cart_total: i64,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let base = match self.tariffs.find_active(origin, destination).await? {
            Some(tariff) => tariff.price,
            None => self.fallback_charge(destination),
        };

        if self.rates.free_shipping_enabled && cart_total >= self.rates.free_shipping_threshold {
            return Ok(0);
        }
        Ok(base)
    }

    /// Local-area charge when the destination mentions the configured
    /// origin district, outside-area charge otherwise.
    fn fallback_charge(&self, destination: &str) -> i64 {
        let origin = self.rates.origin_district.to_lowercase();
        if destination.to_lowercase().contains(&origin) {
            self.rates.inside_charge
        } else {
            self.rates.outside_charge
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MemoryTariffs {
        rows: Mutex<Vec<CourierTariff>>,
    }

    impl MemoryTariffs {
        fn with(rows: Vec<CourierTariff>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
            })
        }
    }

    #[async_trait]
    impl TariffRepository for MemoryTariffs {
        async fn find_active(
            &self,
            origin: &str,
            destination: &str,
        ) -> Result<Option<CourierTariff>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self
                .rows
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
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn upsert(
            &self,
            tariff: &CourierTariff,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.rows.lock().unwrap().push(tariff.clone());
            Ok(())
        }

        async fn deactivate(
            &self,
            id: Uuid,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|t| t.id == id) {
                Some(t) => {
                    t.active = false;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn rajshahi_dhaka_row(price: i64, active: bool) -> CourierTariff {
        CourierTariff {
            id: Uuid::new_v4(),
            partner: "steadfast".to_string(),
            origin_district: "Rajshahi".to_string(),
            destination_district: "Dhaka".to_string(),
            service_type: "regular".to_string(),
            category: "parcel".to_string(),
            price,
            active,
            created_at: Utc::now(),
        }
    }

    fn rates(free_shipping: bool) -> ShippingRates {
        ShippingRates {
            origin_district: "Rajshahi".to_string(),
            inside_charge: 60,
            outside_charge: 120,
            free_shipping_enabled: free_shipping,
            free_shipping_threshold: 5000,
        }
    }

    #[tokio::test]
    async fn test_free_shipping_overrides_tariff() {
        let resolver = TariffResolver::new(
            MemoryTariffs::with(vec![rajshahi_dhaka_row(80, true)]),
            rates(true),
        );

        let charge = resolver.resolve_charge("Rajshahi", "Dhaka", 6000).await.unwrap();
        assert_eq!(charge, 0);
    }

    #[tokio::test]
    async fn test_tariff_row_wins_without_free_shipping() {
        let resolver = TariffResolver::new(
            MemoryTariffs::with(vec![rajshahi_dhaka_row(80, true)]),
            rates(false),
        );

        let charge = resolver.resolve_charge("Rajshahi", "Dhaka", 6000).await.unwrap();
        assert_eq!(charge, 80);
    }

    #[tokio::test]
    async fn test_inactive_rows_are_skipped() {
        let resolver = TariffResolver::new(
            MemoryTariffs::with(vec![rajshahi_dhaka_row(80, false)]),
            rates(false),
        );

        let charge = resolver.resolve_charge("Rajshahi", "Dhaka", 1000).await.unwrap();
        assert_eq!(charge, 120);
    }

    #[tokio::test]
    async fn test_fallback_inside_and_outside() {
        let resolver = TariffResolver::new(MemoryTariffs::with(vec![]), rates(false));

        let inside = resolver
            .resolve_charge("Rajshahi", "Boalia, Rajshahi", 1000)
            .await
            .unwrap();
        let outside = resolver.resolve_charge("Rajshahi", "Sylhet", 1000).await.unwrap();

        assert_eq!(inside, 60);
        assert_eq!(outside, 120);
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let resolver = TariffResolver::new(MemoryTariffs::with(vec![]), rates(true));

        assert_eq!(
            resolver.resolve_charge("Rajshahi", "Dhaka", 5000).await.unwrap(),
            0
        );
        assert_eq!(
            resolver.resolve_charge("Rajshahi", "Dhaka", 4999).await.unwrap(),
            120
        );
    }
}
