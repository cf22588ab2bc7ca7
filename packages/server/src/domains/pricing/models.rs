use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use crate::common::{ItemId, RequisitionId, SupplierId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Supplier {
    pub async fn find(
        id: SupplierId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Idempotent by name: submissions may arrive with a free-text supplier
    /// name instead of an id.
    pub async fn find_or_create_by_name(
        name: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO suppliers (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(name)
        .fetch_one(executor)
        .await
    }
}

/// One recorded quote. Immutable once recorded, except that a later submission
/// for the same (resource, supplier, item) replaces it outright.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceQuote {
    pub id: Uuid,
    pub resource_id: RequisitionId,
    pub supplier_id: SupplierId,
    pub item_id: ItemId,
    pub unit_price: Decimal,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
}

impl PriceQuote {
    /// Last write replaces, never merges silently.
    pub async fn upsert(
        resource_id: RequisitionId,
        supplier_id: SupplierId,
        item_id: ItemId,
        unit_price: Decimal,
        currency: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO price_quotes (resource_id, supplier_id, item_id, unit_price, currency)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (resource_id, supplier_id, item_id) DO UPDATE SET
                unit_price = EXCLUDED.unit_price,
                currency = EXCLUDED.currency,
                recorded_at = now()
            RETURNING *
            "#,
        )
        .bind(resource_id)
        .bind(supplier_id)
        .bind(item_id)
        .bind(unit_price)
        .bind(currency)
        .fetch_one(executor)
        .await
    }

    /// All quotes for a resource in stable input order (recording time, then
    /// id): aggregation tie-breaks depend on this ordering being
    /// deterministic.
    pub async fn find_for_resource(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM price_quotes WHERE resource_id = $1 ORDER BY recorded_at, id",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }
}
