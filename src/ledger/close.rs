//! Sheet close: turn an active route sheet into invoices, transactions and
//! updated customer balances.
//!
//! The close runs in two passes. The first reads and validates every
//! customer on the sheet without writing anything, so an arithmetic mismatch
//! or a missing record aborts with the store untouched. The second posts
//! customers one at a time.
//!
//! Posting a customer is safe to repeat. Before its first write the
//! customer's outstanding amount is recorded in the sheet's
//! `balancesBefore`; once everything is written the customer is appended to
//! `postedCustomers`. If the backend fails in between, the sheet stays
//! active. A retry skips posted customers entirely. For a customer with a
//! recorded balance but no completion mark it reuses the invoice and
//! transactions already written for this sheet, creates only the missing
//! ones, and sets the balance from the recorded amount instead of the live
//! one.
//!
//! There is no lock around the read-modify-write of a customer's outstanding
//! amount: a concurrent writer between the read and the update is lost, and
//! so is a change made between a failed close and its retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

use crate::error::{ConsistencyCheck, LedgerError, Result};
use crate::ledger::ids::{self, ReferenceKind};
use crate::ledger::{round_cents, Ledger};
use crate::model::{
    Customer, Invoice, InvoiceItem, InvoiceStatus, PaymentSplit, Product, SheetRecord,
    SheetStatus, Transaction, TransactionType,
};
use crate::store::{patch, Filter, Store};

/// Largest difference between two amounts that still counts as equal
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// What one customer's line will post, worked out before any write
#[derive(Debug)]
struct Posting {
    customer_id: String,
    customer_name: String,
    items: Vec<InvoiceItem>,
    purchase_total: f64,
    received: PaymentSplit,
}

impl Posting {
    fn is_idle(&self) -> bool {
        self.purchase_total <= 0.0 && self.received.total <= 0.0
    }
}

/// Result of closing the sheet for one customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerOutcome {
    pub customer_id: String,
    pub customer_name: String,
    pub invoice_number: Option<String>,
    pub payment_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub purchase_total: f64,
    pub received: f64,
    pub previous_balance: f64,
    pub new_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloseSummary {
    pub sheet_id: String,
    pub closed_at: DateTime<Utc>,
    /// Customers posted by this run, in sheet order
    pub posted: Vec<CustomerOutcome>,
    /// Customers already posted by an earlier, interrupted run
    pub resumed: Vec<String>,
    /// Customers with no deliveries and no payment
    pub idle: Vec<String>,
    pub invoices: usize,
    pub transactions: usize,
}

fn ensure_matches(
    sheet: &SheetRecord,
    customer_id: &str,
    check: ConsistencyCheck,
    expected: f64,
    actual: f64,
) -> Result<()> {
    if (expected - actual).abs() > AMOUNT_TOLERANCE {
        return Err(LedgerError::Consistency {
            sheet: sheet.id.clone(),
            customer: customer_id.to_string(),
            check,
            expected,
            actual,
        });
    }
    Ok(())
}

impl<S: Store> Ledger<S> {
    /// Close a route sheet, posting its deliveries and collections.
    ///
    /// Fails with `NotFound` for an unknown sheet, `AlreadyClosed` if the sheet
    /// was closed before, and `Consistency` when a line's arithmetic does not
    /// add up. Closing is not idempotent: a second close is rejected.
    #[instrument(skip(self))]
    pub fn close_sheet(&self, sheet_id: &str) -> Result<CloseSummary> {
        let sheet: SheetRecord = self.store.get(sheet_id)?;
        sheet.ensure_active()?;

        let products: HashMap<String, Product> = self
            .store
            .list::<Product>(&Filter::all())?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut resumed = Vec::new();
        let mut plan = Vec::with_capacity(sheet.customers.len());
        for snapshot in &sheet.customers {
            if sheet.posted_customers.contains(&snapshot.id) {
                resumed.push(snapshot.id.clone());
                continue;
            }
            let customer: Customer = self.store.get(&snapshot.id)?;
            plan.push(self.plan_customer(&sheet, &customer, &products)?);
        }
        if !resumed.is_empty() {
            info!(count = resumed.len(), "Resuming interrupted close");
        }

        let now = Utc::now();
        let mut summary = CloseSummary {
            sheet_id: sheet.id.clone(),
            closed_at: now,
            posted: Vec::new(),
            resumed,
            idle: Vec::new(),
            invoices: 0,
            transactions: 0,
        };

        let mut posted_ids = sheet.posted_customers.clone();
        let mut balances_before = sheet.balances_before.clone();
        for posting in plan {
            if posting.is_idle() {
                debug!(customer = %posting.customer_id, "No activity, skipping");
                summary.idle.push(posting.customer_id);
                continue;
            }

            let outcome =
                self.post_customer(&sheet, &posting, &mut balances_before, now, &mut summary)?;
            posted_ids.push(outcome.customer_id.clone());
            self.store.update::<SheetRecord>(
                &sheet.id,
                patch([("postedCustomers", json!(posted_ids))]),
            )?;
            summary.posted.push(outcome);
        }

        self.store.update::<SheetRecord>(
            &sheet.id,
            patch([
                ("status", json!(SheetStatus::Closed)),
                ("closedAt", json!(now)),
            ]),
        )?;

        info!(
            posted = summary.posted.len(),
            idle = summary.idle.len(),
            invoices = summary.invoices,
            transactions = summary.transactions,
            "Closed sheet"
        );
        Ok(summary)
    }

    /// Validate one customer's sheet entries and build their posting
    fn plan_customer(
        &self,
        sheet: &SheetRecord,
        customer: &Customer,
        products: &HashMap<String, Product>,
    ) -> Result<Posting> {
        let received = sheet.received(&customer.id);
        ensure_matches(
            sheet,
            &customer.id,
            ConsistencyCheck::PaymentSplit,
            received.cash + received.upi,
            received.total,
        )?;

        let mut items = Vec::new();
        let mut purchase_total = 0.0;
        if let Some(lines) = sheet.delivery_data.get(&customer.id) {
            for (product_id, line) in lines {
                let product = products
                    .get(product_id)
                    .ok_or_else(|| LedgerError::not_found("Product", product_id.as_str()))?;
                let unit_price = customer.unit_price(product);
                ensure_matches(
                    sheet,
                    &customer.id,
                    ConsistencyCheck::LineAmount {
                        product: product_id.clone(),
                    },
                    line.quantity * unit_price,
                    line.amount,
                )?;

                purchase_total += line.amount;
                if line.quantity != 0.0 {
                    items.push(InvoiceItem {
                        product_id: product_id.clone(),
                        product_name: product.name.clone(),
                        quantity: line.quantity,
                        unit_price,
                        total: line.amount,
                    });
                }
            }
        }
        let purchase_total = round_cents(purchase_total);

        let recorded = sheet
            .purchase_totals
            .get(&customer.id)
            .copied()
            .unwrap_or(0.0);
        ensure_matches(
            sheet,
            &customer.id,
            ConsistencyCheck::PurchaseTotal,
            purchase_total,
            recorded,
        )?;

        Ok(Posting {
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            items,
            purchase_total,
            received,
        })
    }

    /// Write the invoice, transactions and new balance for one customer,
    /// reusing whatever an interrupted close already wrote for them
    fn post_customer(
        &self,
        sheet: &SheetRecord,
        posting: &Posting,
        balances_before: &mut BTreeMap<String, f64>,
        now: DateTime<Utc>,
        summary: &mut CloseSummary,
    ) -> Result<CustomerOutcome> {
        let customer_id = posting.customer_id.as_str();
        let (current, written_invoices, written_transactions) =
            match balances_before.get(customer_id).copied() {
                Some(balance) => {
                    let filter =
                        Filter::eq("sheetId", sheet.id.as_str()).and("customerId", customer_id);
                    let invoices: Vec<Invoice> = self.store.list(&filter)?;
                    let transactions: Vec<Transaction> = self.store.list(&filter)?;
                    info!(
                        customer = customer_id,
                        invoices = invoices.len(),
                        transactions = transactions.len(),
                        "Resuming partly posted customer"
                    );
                    (balance, invoices, transactions)
                }
                None => {
                    // Re-read: the snapshot balance may be stale by now
                    let customer: Customer = self.store.get(customer_id)?;
                    balances_before.insert(customer.id.clone(), customer.outstanding_amount);
                    self.store.update::<SheetRecord>(
                        &sheet.id,
                        patch([("balancesBefore", json!(balances_before))]),
                    )?;
                    (customer.outstanding_amount, Vec::new(), Vec::new())
                }
            };
        let purchase_total = posting.purchase_total;
        let received = posting.received.total;

        let mut outcome = CustomerOutcome {
            customer_id: customer_id.to_string(),
            customer_name: posting.customer_name.clone(),
            invoice_number: None,
            payment_id: None,
            status: None,
            purchase_total,
            received,
            previous_balance: current,
            new_balance: round_cents(current + purchase_total - received),
        };

        if purchase_total > 0.0 {
            let (invoice_number, status) = match written_invoices.first() {
                Some(invoice) => (invoice.invoice_number.clone(), invoice.status),
                None => {
                    let invoice_number =
                        ids::reference(ReferenceKind::Invoice, &sheet.id, customer_id, now);
                    let balance_change = round_cents(purchase_total - received);
                    let status = InvoiceStatus::from_amounts(purchase_total, received);

                    self.store.create(&Invoice {
                        id: ids::record_id(),
                        invoice_number: invoice_number.clone(),
                        customer_id: customer_id.to_string(),
                        customer_name: posting.customer_name.clone(),
                        sheet_id: sheet.id.clone(),
                        route_id: sheet.route_id.clone(),
                        date: sheet.date,
                        items: posting.items.clone(),
                        subtotal: purchase_total,
                        total_amount: purchase_total,
                        amount_received: received,
                        balance_change,
                        previous_balance: current,
                        customer_final_balance: round_cents(current + balance_change),
                        status,
                        created_at: now,
                    })?;
                    summary.invoices += 1;
                    (invoice_number, status)
                }
            };

            // The sale carries the full amount; the payment posts separately
            let has_sale = written_transactions
                .iter()
                .any(|t| t.kind == TransactionType::Sale);
            if !has_sale {
                self.store.create(&Transaction {
                    id: ids::record_id(),
                    customer_id: customer_id.to_string(),
                    kind: TransactionType::Sale,
                    total_amount: purchase_total,
                    amount_received: 0.0,
                    balance_change: purchase_total,
                    invoice_number: invoice_number.clone(),
                    cash: None,
                    upi: None,
                    sheet_id: Some(sheet.id.clone()),
                    date: sheet.date,
                    notes: None,
                    created_at: now,
                })?;
                summary.transactions += 1;
            }

            outcome.invoice_number = Some(invoice_number);
            outcome.status = Some(status);
        }

        if received > 0.0 {
            let written = written_transactions
                .iter()
                .find(|t| t.kind == TransactionType::Payment);
            let payment_id = match written {
                Some(payment) => payment.invoice_number.clone(),
                None => {
                    let payment_id =
                        ids::reference(ReferenceKind::Payment, &sheet.id, customer_id, now);
                    self.store.create(&Transaction {
                        id: ids::record_id(),
                        customer_id: customer_id.to_string(),
                        kind: TransactionType::Payment,
                        total_amount: 0.0,
                        amount_received: received,
                        balance_change: -received,
                        invoice_number: payment_id.clone(),
                        cash: Some(posting.received.cash),
                        upi: Some(posting.received.upi),
                        sheet_id: Some(sheet.id.clone()),
                        date: sheet.date,
                        notes: None,
                        created_at: now,
                    })?;
                    summary.transactions += 1;
                    payment_id
                }
            };
            outcome.payment_id = Some(payment_id);
        }

        self.store.update::<Customer>(
            customer_id,
            patch([("outstandingAmount", json!(outcome.new_balance))]),
        )?;

        info!(
            customer = customer_id,
            purchase_total,
            received,
            previous_balance = current,
            new_balance = outcome.new_balance,
            "Posted customer"
        );
        Ok(outcome)
    }
}
