use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::ledger::{round_cents, Ledger};
use crate::model::{Customer, TransactionType};
use crate::store::Store;

/// One posted transaction with the balance after it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub kind: TransactionType,
    pub reference: String,
    pub amount_received: f64,
    pub balance_change: f64,
    pub balance: f64,
}

impl<S: Store> Ledger<S> {
    /// The customer's transactions in posting order with a running balance.
    ///
    /// The opening balance is itself an adjustment, so the last line's balance
    /// matches the customer's outstanding amount unless something wrote the
    /// balance outside the ledger.
    pub fn statement(&self, customer_id: &str) -> Result<Vec<StatementLine>> {
        // Fail with NotFound rather than an empty statement
        self.store.get::<Customer>(customer_id)?;

        let mut balance = 0.0;
        Ok(self
            .transactions(customer_id)?
            .into_iter()
            .map(|t| {
                balance = round_cents(balance + t.balance_change);
                StatementLine {
                    date: t.date,
                    kind: t.kind,
                    reference: t.invoice_number,
                    amount_received: t.amount_received,
                    balance_change: t.balance_change,
                    balance,
                }
            })
            .collect())
    }
}
