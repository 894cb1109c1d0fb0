use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Product;
use crate::store::Record;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub route: String,
    #[serde(default)]
    pub opening_balance: f64,
    /// Positive when the customer owes money, negative when in credit.
    #[serde(default)]
    pub outstanding_amount: f64,
    /// Per-customer overrides keyed by product id
    #[serde(default)]
    pub product_prices: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Price this customer pays for `product`: their override if set, else the default.
    pub fn unit_price(&self, product: &Product) -> f64 {
        self.product_prices
            .get(&product.id)
            .copied()
            .unwrap_or(product.default_price)
    }
}

impl Record for Customer {
    const COLLECTION: &'static str = "customers";
    const ENTITY: &'static str = "Customer";
    const DECIMAL_FIELDS: &'static [&'static str] = &["openingBalance", "outstandingAmount"];

    fn id(&self) -> &str {
        &self.id
    }
}

/// Registration input for a customer
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    /// Generated when not given
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub route: String,
    pub opening_balance: f64,
    pub product_prices: BTreeMap<String, f64>,
}

/// Summary of one delivery route, derived from its customers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub name: String,
    pub customers: usize,
    pub outstanding: f64,
}
