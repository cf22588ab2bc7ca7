//! Pure aggregation over supplier quotes. No I/O: callers load quotes in
//! stable input order and get deterministic output back.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::common::{ItemId, SupplierId, WorkflowError};

use super::models::PriceQuote;

/// Derived statistics for one item across all submitted quotes. Not stored
/// authoritatively; recomputed from the full quote set on every invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferencePriceLine {
    pub item_id: ItemId,
    pub min: Decimal,
    pub max: Decimal,
    pub avg: Decimal,
    /// `None` when quotes for this item span mixed currencies. That is a
    /// data-quality signal surfaced to the caller, never silently converted.
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedLine {
    pub item_id: ItemId,
    pub unit_price: Decimal,
}

/// The supplier with the lowest total across commonly priced items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub supplier_id: SupplierId,
    pub lines: Vec<RecommendedLine>,
    pub grand_total: Decimal,
}

fn is_valid(quote: &PriceQuote) -> bool {
    quote.unit_price > Decimal::ZERO
}

/// Per-item min/max/avg over quotes with a finite positive unit price.
/// Output order follows the first appearance of each item in the input, so
/// repeated runs over the same quote set are identical.
pub fn aggregate(quotes: &[PriceQuote]) -> Vec<ReferencePriceLine> {
    let mut order: Vec<ItemId> = Vec::new();
    let mut by_item: HashMap<ItemId, Vec<&PriceQuote>> = HashMap::new();

    for quote in quotes.iter().filter(|q| is_valid(q)) {
        by_item
            .entry(quote.item_id)
            .or_insert_with(|| {
                order.push(quote.item_id);
                Vec::new()
            })
            .push(quote);
    }

    order
        .into_iter()
        .map(|item_id| {
            let item_quotes = &by_item[&item_id];
            let prices: Vec<Decimal> = item_quotes.iter().map(|q| q.unit_price).collect();
            let min = prices.iter().copied().min().unwrap_or_default();
            let max = prices.iter().copied().max().unwrap_or_default();
            let sum: Decimal = prices.iter().copied().sum();
            let avg = sum / Decimal::from(prices.len());

            let first_currency = &item_quotes[0].currency;
            let currency = item_quotes
                .iter()
                .all(|q| &q.currency == first_currency)
                .then(|| first_currency.clone());

            ReferencePriceLine {
                item_id,
                min,
                max,
                avg,
                currency,
            }
        })
        .collect()
}

/// Pick the supplier with the lowest total across commonly priced items.
///
/// Items a supplier did not price are excluded from that supplier's total,
/// never counted as zero. When no item is priced by every candidate, each
/// supplier's own total decides. Ties break to the first supplier in input
/// order. Quotes in mixed currencies make totals incomparable and are a hard
/// `CurrencyMismatch` error.
pub fn recommend(quotes: &[PriceQuote]) -> Result<Option<Recommendation>, WorkflowError> {
    let valid: Vec<&PriceQuote> = quotes.iter().filter(|q| is_valid(q)).collect();
    if valid.is_empty() {
        return Ok(None);
    }

    let mut currencies: Vec<&str> = Vec::new();
    for quote in &valid {
        if !currencies.contains(&quote.currency.as_str()) {
            currencies.push(&quote.currency);
        }
    }
    if currencies.len() > 1 {
        return Err(WorkflowError::CurrencyMismatch(currencies.join(", ")));
    }

    // Group per supplier, preserving first-seen order for both suppliers and
    // items. A later quote for the same (supplier, item) replaces the earlier.
    let mut supplier_order: Vec<SupplierId> = Vec::new();
    let mut item_order: Vec<ItemId> = Vec::new();
    let mut priced: HashMap<SupplierId, HashMap<ItemId, Decimal>> = HashMap::new();

    for quote in &valid {
        if !supplier_order.contains(&quote.supplier_id) {
            supplier_order.push(quote.supplier_id);
        }
        if !item_order.contains(&quote.item_id) {
            item_order.push(quote.item_id);
        }
        priced
            .entry(quote.supplier_id)
            .or_default()
            .insert(quote.item_id, quote.unit_price);
    }

    let common_items: Vec<ItemId> = item_order
        .iter()
        .filter(|item| supplier_order.iter().all(|s| priced[s].contains_key(item)))
        .copied()
        .collect();

    let comparison_total = |supplier: &SupplierId| -> Decimal {
        let items = &priced[supplier];
        if common_items.is_empty() {
            items.values().copied().sum()
        } else {
            common_items.iter().map(|item| items[item]).sum()
        }
    };

    let mut winner = supplier_order[0];
    let mut best = comparison_total(&winner);
    for supplier in supplier_order.iter().skip(1) {
        let total = comparison_total(supplier);
        // Strictly less: on a tie the first supplier in input order stays.
        if total < best {
            winner = *supplier;
            best = total;
        }
    }

    let winner_items = &priced[&winner];
    let lines: Vec<RecommendedLine> = item_order
        .iter()
        .filter_map(|item| {
            winner_items.get(item).map(|price| RecommendedLine {
                item_id: *item,
                unit_price: *price,
            })
        })
        .collect();
    let grand_total = lines.iter().map(|l| l.unit_price).sum();

    Ok(Some(Recommendation {
        supplier_id: winner,
        lines,
        grand_total,
    }))
}
