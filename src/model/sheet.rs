use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{LedgerError, Result};
use crate::model::round_cents;
use crate::store::Record;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SheetStatus {
    Active,
    Closed,
}

impl std::fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetStatus::Active => write!(f, "ACTIVE"),
            SheetStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A customer as they stood when the sheet was opened
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub outstanding_amount: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
pub struct DeliveryLine {
    pub quantity: f64,
    pub amount: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
pub struct PaymentSplit {
    pub cash: f64,
    pub upi: f64,
    pub total: f64,
}

impl PaymentSplit {
    pub fn new(cash: f64, upi: f64) -> Self {
        Self {
            cash,
            upi,
            total: round_cents(cash + upi),
        }
    }
}

/// One route's worksheet for one day.
///
/// Deliveries and collections are entered while the sheet is active; closing
/// it posts them to the ledger and freezes the record.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SheetRecord {
    pub id: String,
    pub route_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub customers: Vec<CustomerSnapshot>,
    /// customer id -> product id -> line
    #[serde(default)]
    pub delivery_data: BTreeMap<String, BTreeMap<String, DeliveryLine>>,
    /// customer id -> purchase total as entered on the sheet
    #[serde(default)]
    pub purchase_totals: BTreeMap<String, f64>,
    #[serde(default)]
    pub amount_received: BTreeMap<String, PaymentSplit>,
    pub status: SheetStatus,
    /// Customers whose posting finished, in posting order
    #[serde(default)]
    pub posted_customers: Vec<String>,
    /// customer id -> outstanding amount read just before their posting began
    #[serde(default)]
    pub balances_before: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl SheetRecord {
    /// Derive the sheet id from its route, date and opening time
    pub fn sheet_id(route: &str, date: NaiveDate, time: NaiveTime) -> String {
        let route: String = route
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("{}_{}_{}", route, date.format("%Y-%m-%d"), time.format("%H%M"))
    }

    pub fn is_closed(&self) -> bool {
        self.status == SheetStatus::Closed
    }

    /// Closed sheets are immutable.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LedgerError::AlreadyClosed(self.id.clone()));
        }
        Ok(())
    }

    pub fn snapshot(&self, customer_id: &str) -> Option<&CustomerSnapshot> {
        self.customers.iter().find(|c| c.id == customer_id)
    }

    pub fn received(&self, customer_id: &str) -> PaymentSplit {
        self.amount_received
            .get(customer_id)
            .copied()
            .unwrap_or_default()
    }
}

impl Record for SheetRecord {
    const COLLECTION: &'static str = "sheets";
    const ENTITY: &'static str = "Sheet";

    fn id(&self) -> &str {
        &self.id
    }
}
