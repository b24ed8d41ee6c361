use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::entities::product;
use crate::errors::ServiceError;
use crate::services::catalog::CatalogService;

/// Session-resident cart: product id to quantity. BTreeMap keeps listing
/// order stable across requests.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    items: BTreeMap<i64, i64>,
}

/// Coerces a client-supplied quantity into a positive count. Numbers and
/// numeric strings are honored; anything else, or anything below one,
/// becomes a single unit.
pub fn coerce_quantity(raw: Option<&Value>) -> i64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|q| *q >= 1).unwrap_or(1)
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn quantity_of(&self, product_id: i64) -> Option<i64> {
        self.items.get(&product_id).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.items.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Adds a product, accumulating onto any existing quantity. Each call's
    /// quantity is clamped to at least one before it is added; the running
    /// total saturates so client-supplied values cannot overflow it.
    pub fn add(&mut self, product_id: i64, quantity: i64) {
        let entry = self.items.entry(product_id).or_insert(0);
        *entry = entry.saturating_add(quantity.max(1));
    }

    /// Replaces the whole cart from an update form. `None` means the
    /// client sent no quantity fields at all, and the cart is left as it
    /// was. Entries with non-positive quantities are dropped.
    pub fn set_all(&mut self, quantities: Option<HashMap<i64, i64>>) {
        if let Some(quantities) = quantities {
            self.items = quantities.into_iter().filter(|(_, q)| *q > 0).collect();
        }
    }

    pub fn remove(&mut self, product_id: i64) {
        self.items.remove(&product_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// One priced cart line, resolved against the live catalog.
#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub product: product::Model,
    pub quantity: i64,
    pub line_total: Decimal,
}

/// Cart contents priced at current catalog values.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

/// Read-side cart pricing. Mutation happens directly on the session's
/// `Cart`; this service only resolves ids against the catalog.
pub struct CartService {
    catalog: Arc<CatalogService>,
}

impl CartService {
    pub fn new(catalog: Arc<CatalogService>) -> Self {
        Self { catalog }
    }

    /// Prices the cart. Ids that no longer resolve are skipped rather
    /// than failing the whole view, so a deleted product cannot wedge a
    /// visitor's cart.
    pub async fn view(&self, cart: &Cart) -> Result<CartView, ServiceError> {
        let mut lines = Vec::with_capacity(cart.len());
        let mut total = Decimal::ZERO;

        for (product_id, quantity) in cart.entries() {
            match self.catalog.get_by_id(product_id).await? {
                Some(product) => {
                    let line_total = product.price * Decimal::from(quantity);
                    total += line_total;
                    lines.push(CartLine {
                        product,
                        quantity,
                        line_total,
                    });
                }
                None => {
                    debug!(product_id, "Skipping cart entry for missing product");
                }
            }
        }

        Ok(CartView { lines, total })
    }
}
