use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Partial,
    Pending,
}

impl InvoiceStatus {
    /// Derive the status of a sale from what was collected against it
    pub fn from_amounts(total: f64, received: f64) -> Self {
        if received >= total {
            InvoiceStatus::Paid
        } else if received > 0.0 {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Pending
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Paid => write!(f, "PAID"),
            InvoiceStatus::Partial => write!(f, "PARTIAL"),
            InvoiceStatus::Pending => write!(f, "PENDING"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

/// A posted sale. Written only by the sheet close.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub sheet_id: String,
    pub route_id: String,
    pub date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub total_amount: f64,
    pub amount_received: f64,
    pub balance_change: f64,
    pub previous_balance: f64,
    pub customer_final_balance: f64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

impl Record for Invoice {
    const COLLECTION: &'static str = "invoices";
    const ENTITY: &'static str = "Invoice";
    const DECIMAL_FIELDS: &'static [&'static str] = &[
        "subtotal",
        "totalAmount",
        "amountReceived",
        "balanceChange",
        "previousBalance",
        "customerFinalBalance",
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
