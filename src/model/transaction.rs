use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Payment,
    Adjustment,
}

impl TransactionType {
    /// Order of entries posted at the same instant: the sale a payment
    /// settles comes before the payment.
    pub fn posting_rank(self) -> u8 {
        match self {
            TransactionType::Adjustment => 0,
            TransactionType::Sale => 1,
            TransactionType::Payment => 2,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Sale => write!(f, "sale"),
            TransactionType::Payment => write!(f, "payment"),
            TransactionType::Adjustment => write!(f, "adjustment"),
        }
    }
}

/// A posted ledger entry.
///
/// `balance_change` is positive when it increases what the customer owes.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub customer_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub total_amount: f64,
    pub amount_received: f64,
    pub balance_change: f64,
    /// Unique across all transactions; payments carry their payment id here
    pub invoice_number: String,
    #[serde(default)]
    pub cash: Option<f64>,
    #[serde(default)]
    pub upi: Option<f64>,
    #[serde(default)]
    pub sheet_id: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Transaction {
    const COLLECTION: &'static str = "transactions";
    const ENTITY: &'static str = "Transaction";
    const DECIMAL_FIELDS: &'static [&'static str] = &[
        "totalAmount",
        "amountReceived",
        "balanceChange",
        "cash",
        "upi",
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
