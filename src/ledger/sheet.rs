use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::ledger::{round_cents, Ledger};
use crate::model::{
    Customer, CustomerSnapshot, DeliveryLine, PaymentSplit, Product, SheetRecord, SheetStatus,
};
use crate::store::{patch, Filter, Store};

impl<S: Store> Ledger<S> {
    /// Open a route worksheet, snapshotting the route's customers as they stand now
    pub fn open_sheet(&self, route: &str, date: NaiveDate, time: NaiveTime) -> Result<SheetRecord> {
        let id = SheetRecord::sheet_id(route, date, time);
        match self.store.get::<SheetRecord>(&id) {
            Ok(_) => return Err(LedgerError::SheetExists(id)),
            Err(LedgerError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let customers: Vec<CustomerSnapshot> = self
            .customers(Some(route))?
            .into_iter()
            .map(|c| CustomerSnapshot {
                id: c.id,
                name: c.name,
                outstanding_amount: c.outstanding_amount,
            })
            .collect();
        if customers.is_empty() {
            return Err(LedgerError::EmptyRoute(route.to_string()));
        }

        let sheet = SheetRecord {
            id,
            route_id: route.to_string(),
            date,
            time,
            customers,
            delivery_data: BTreeMap::new(),
            purchase_totals: BTreeMap::new(),
            amount_received: BTreeMap::new(),
            status: SheetStatus::Active,
            posted_customers: Vec::new(),
            balances_before: BTreeMap::new(),
            created_at: Utc::now(),
            closed_at: None,
        };
        let sheet = self.store.create(&sheet)?;
        info!(sheet = %sheet.id, customers = sheet.customers.len(), "Opened sheet");
        Ok(sheet)
    }

    pub fn sheet(&self, sheet_id: &str) -> Result<SheetRecord> {
        self.store.get(sheet_id)
    }

    /// Sheets ordered by date and time, optionally for one route
    pub fn sheets(&self, route: Option<&str>) -> Result<Vec<SheetRecord>> {
        let filter = match route {
            Some(route) => Filter::eq("routeId", route),
            None => Filter::all(),
        };
        let mut sheets: Vec<SheetRecord> = self.store.list(&filter)?;
        sheets.sort_by(|a, b| (a.date, a.time, &a.id).cmp(&(b.date, b.time, &b.id)));
        Ok(sheets)
    }

    fn active_sheet_for(&self, sheet_id: &str, customer_id: &str) -> Result<SheetRecord> {
        let sheet: SheetRecord = self.store.get(sheet_id)?;
        sheet.ensure_active()?;
        if sheet.snapshot(customer_id).is_none() {
            return Err(LedgerError::not_found("Customer", customer_id));
        }
        Ok(sheet)
    }

    /// Enter a delivered quantity. The line amount is priced now, with the
    /// customer's override taking precedence over the product default, and the
    /// customer's purchase total on the sheet is recomputed. Quantity 0 removes
    /// the line.
    pub fn record_delivery(
        &self,
        sheet_id: &str,
        customer_id: &str,
        product_id: &str,
        quantity: f64,
    ) -> Result<DeliveryLine> {
        if quantity < 0.0 || !quantity.is_finite() {
            return Err(LedgerError::InvalidQuantity {
                product: product_id.to_string(),
                quantity,
            });
        }
        let sheet = self.active_sheet_for(sheet_id, customer_id)?;
        let customer: Customer = self.store.get(customer_id)?;
        let product: Product = self.store.get(product_id)?;

        let line = DeliveryLine {
            quantity,
            amount: round_cents(quantity * customer.unit_price(&product)),
        };

        let mut delivery_data = sheet.delivery_data;
        let lines = delivery_data.entry(customer_id.to_string()).or_default();
        if quantity == 0.0 {
            lines.remove(product_id);
        } else {
            lines.insert(product_id.to_string(), line);
        }
        let total = round_cents(lines.values().map(|l| l.amount).sum());
        if lines.is_empty() {
            delivery_data.remove(customer_id);
        }

        let mut purchase_totals = sheet.purchase_totals;
        purchase_totals.insert(customer_id.to_string(), total);

        self.store.update::<SheetRecord>(
            sheet_id,
            patch([
                ("deliveryData", json!(delivery_data)),
                ("purchaseTotals", json!(purchase_totals)),
            ]),
        )?;
        debug!(
            sheet = sheet_id,
            customer = customer_id,
            product = product_id,
            quantity,
            "Recorded delivery"
        );
        Ok(line)
    }

    /// Enter what the customer paid on this sheet, replacing any earlier entry
    pub fn record_payment(
        &self,
        sheet_id: &str,
        customer_id: &str,
        cash: f64,
        upi: f64,
    ) -> Result<PaymentSplit> {
        for (field, amount) in [("cash", cash), ("upi", upi)] {
            if amount < 0.0 || !amount.is_finite() {
                return Err(LedgerError::InvalidAmount { field, amount });
            }
        }
        let sheet = self.active_sheet_for(sheet_id, customer_id)?;

        let split = PaymentSplit::new(round_cents(cash), round_cents(upi));
        let mut received = sheet.amount_received;
        received.insert(customer_id.to_string(), split);

        self.store
            .update::<SheetRecord>(sheet_id, patch([("amountReceived", json!(received))]))?;
        debug!(sheet = sheet_id, customer = customer_id, total = split.total, "Recorded payment");
        Ok(split)
    }
}
