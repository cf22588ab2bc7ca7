//! Builders for callers, configuration, and seeded requisitions.

#![allow(dead_code)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use procurement_core::common::{Caller, ItemId, RequisitionId, UserId, UserRole};
use procurement_core::config::{Config, LeaseConfig};
use procurement_core::domains::approval::activities::package::{self, CreateRequisition};
use procurement_core::domains::approval::models::LineDraft;

pub fn officer(name: &str) -> Caller {
    Caller::new(UserId::new(), name, vec![UserRole::Officer])
}

pub fn manager(name: &str) -> Caller {
    Caller::new(UserId::new(), name, vec![UserRole::Manager])
}

pub fn admin(name: &str) -> Caller {
    Caller::new(UserId::new(), name, vec![UserRole::Admin])
}

/// Config for tests that never touch the network.
pub fn test_config(tender_threshold: Decimal) -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        lease: LeaseConfig::default(),
        tender_threshold,
    }
}

pub fn line(item_id: ItemId, quantity: i64, final_unit_price: i64) -> LineDraft {
    LineDraft {
        item_id,
        description: "test item".to_string(),
        uom: Some("EA".to_string()),
        quantity: Some(Decimal::from(quantity)),
        currency: Some("USD".to_string()),
        final_unit_price: Some(Decimal::from(final_unit_price)),
    }
}

/// Seed a requisition with the given required officers and lines.
pub async fn seed_requisition(
    pool: &PgPool,
    officers: &[UserId],
    lines: Vec<LineDraft>,
) -> RequisitionId {
    let request = CreateRequisition {
        resource_id: None,
        officers: officers.to_vec(),
        lines,
    };
    let subject = package::create_requisition(pool, &request)
        .await
        .expect("failed to seed requisition");
    subject.resource_id
}
