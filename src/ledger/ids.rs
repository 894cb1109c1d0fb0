use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Kind of ledger reference, which sets its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Invoice,
    Payment,
    Adjustment,
}

impl ReferenceKind {
    fn prefix(self) -> &'static str {
        match self {
            ReferenceKind::Invoice => "INV",
            ReferenceKind::Payment => "PAY",
            ReferenceKind::Adjustment => "ADJ",
        }
    }
}

/// Build a unique invoice/payment reference.
///
/// Scoped to the operation, the sheet (or other origin) and the customer, then
/// salted with the millisecond timestamp and a random suffix so two references
/// minted in the same millisecond for the same customer still differ.
pub fn reference(kind: ReferenceKind, scope: &str, customer_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        kind.prefix(),
        scope,
        customer_id,
        at.timestamp_millis(),
        random_suffix()
    )
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// Fresh storage id for a record
pub fn record_id() -> String {
    Uuid::new_v4().to_string()
}
