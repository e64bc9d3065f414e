use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tokri_courier::tariff::{CourierTariff, TariffRepository};

pub struct PgTariffRepository {
    pool: PgPool,
}

impl PgTariffRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TariffRow {
    id: Uuid,
    partner: String,
    origin_district: String,
    destination_district: String,
    service_type: String,
    category: String,
    price: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<TariffRow> for CourierTariff {
    fn from(row: TariffRow) -> Self {
        CourierTariff {
            id: row.id,
            partner: row.partner,
            origin_district: row.origin_district,
            destination_district: row.destination_district,
            service_type: row.service_type,
            category: row.category,
            price: row.price,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

const TARIFF_COLUMNS: &str = "id, partner, origin_district, destination_district, service_type, \
     category, price, active, created_at";

#[async_trait]
impl TariffRepository for PgTariffRepository {
    async fn find_active(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<CourierTariff>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, TariffRow>(&format!(
            "SELECT {} FROM courier_tariffs \
             WHERE active AND lower(origin_district) = lower($1) \
               AND lower(destination_district) = lower($2) \
             ORDER BY created_at ASC LIMIT 1",
            TARIFF_COLUMNS
        ))
        .bind(origin)
        .bind(destination)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CourierTariff::from))
    }

    async fn list(
        &self,
    ) -> Result<Vec<CourierTariff>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, TariffRow>(&format!(
            "SELECT {} FROM courier_tariffs ORDER BY origin_district, destination_district",
            TARIFF_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CourierTariff::from).collect())
    }

    async fn upsert(
        &self,
        tariff: &CourierTariff,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO courier_tariffs (id, partner, origin_district, destination_district,
                service_type, category, price, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET partner = EXCLUDED.partner,
                origin_district = EXCLUDED.origin_district,
                destination_district = EXCLUDED.destination_district,
                service_type = EXCLUDED.service_type,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                active = EXCLUDED.active
            "#,
        )
        .bind(tariff.id)
        .bind(&tariff.partner)
        .bind(&tariff.origin_district)
        .bind(&tariff.destination_district)
        .bind(&tariff.service_type)
        .bind(&tariff.category)
        .bind(tariff.price)
        .bind(tariff.active)
        .bind(tariff.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate(
        &self,
        id: Uuid,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("UPDATE courier_tariffs SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
