//! Ledger operations over an injected [`Store`].
//!
//! The storage backend is chosen once at startup and handed to
//! [`Ledger::new`]; nothing in here reads configuration or caches records
//! between calls.

mod close;
pub mod ids;
mod sheet;
mod statement;

pub use close::{CloseSummary, CustomerOutcome, AMOUNT_TOLERANCE};
pub use statement::StatementLine;

use chrono::{Local, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::model::{
    Customer, Invoice, NewCustomer, NewProduct, Product, RouteInfo, Transaction, TransactionType,
};
use crate::store::{patch, Filter, Store};
use ids::ReferenceKind;

pub struct Ledger<S> {
    store: S,
}

pub(crate) use crate::model::round_cents;

fn check_price(item: &str, price: f64) -> Result<()> {
    if price < 0.0 || !price.is_finite() {
        return Err(LedgerError::InvalidPrice {
            item: item.to_string(),
            price,
        });
    }
    Ok(())
}

impl<S: Store> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a customer. A non-zero opening balance is posted as an
    /// adjustment so the ledger explains the starting outstanding amount.
    pub fn register_customer(&self, new: NewCustomer) -> Result<Customer> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName("Customer"));
        }
        if new.route.trim().is_empty() {
            return Err(LedgerError::EmptyName("Route"));
        }
        for (product, price) in &new.product_prices {
            check_price(product, *price)?;
        }

        let now = Utc::now();
        let customer = Customer {
            id: new.id.unwrap_or_else(ids::record_id),
            name: name.to_string(),
            phone: new.phone,
            route: new.route.trim().to_string(),
            opening_balance: round_cents(new.opening_balance),
            outstanding_amount: round_cents(new.opening_balance),
            product_prices: new.product_prices,
            created_at: now,
        };
        let customer = self.store.create(&customer)?;

        if customer.opening_balance != 0.0 {
            let adjustment = Transaction {
                id: ids::record_id(),
                customer_id: customer.id.clone(),
                kind: TransactionType::Adjustment,
                total_amount: customer.opening_balance,
                amount_received: 0.0,
                balance_change: customer.opening_balance,
                invoice_number: ids::reference(
                    ReferenceKind::Adjustment,
                    "OPENING",
                    &customer.id,
                    now,
                ),
                cash: None,
                upi: None,
                sheet_id: None,
                date: Local::now().date_naive(),
                notes: Some("Opening balance".to_string()),
                created_at: now,
            };
            self.store.create(&adjustment)?;
        }

        info!(
            customer = %customer.id,
            route = %customer.route,
            opening_balance = customer.opening_balance,
            "Registered customer"
        );
        Ok(customer)
    }

    /// Set a customer-specific price for a product
    pub fn set_customer_price(
        &self,
        customer_id: &str,
        product_id: &str,
        price: f64,
    ) -> Result<()> {
        check_price(product_id, price)?;
        let customer: Customer = self.store.get(customer_id)?;
        self.store.get::<Product>(product_id)?;

        let mut prices = customer.product_prices;
        prices.insert(product_id.to_string(), price);
        self.store
            .update::<Customer>(customer_id, patch([("productPrices", json!(prices))]))
    }

    pub fn add_product(&self, new: NewProduct) -> Result<Product> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName("Product"));
        }
        check_price(name, new.default_price)?;

        let product = Product {
            id: new.id.unwrap_or_else(ids::record_id),
            name: name.to_string(),
            default_price: new.default_price,
            unit: new.unit,
            created_at: Utc::now(),
        };
        let product = self.store.create(&product)?;
        info!(product = %product.id, price = product.default_price, "Added product");
        Ok(product)
    }

    /// Customers sorted by name, optionally restricted to one route
    pub fn customers(&self, route: Option<&str>) -> Result<Vec<Customer>> {
        let filter = match route {
            Some(route) => Filter::eq("route", route),
            None => Filter::all(),
        };
        let mut customers: Vec<Customer> = self.store.list(&filter)?;
        customers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(customers)
    }

    pub fn products(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.store.list(&Filter::all())?;
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    /// Per-route customer counts and outstanding totals
    pub fn routes(&self) -> Result<Vec<RouteInfo>> {
        let mut routes: BTreeMap<String, RouteInfo> = BTreeMap::new();
        for customer in self.store.list::<Customer>(&Filter::all())? {
            let info = routes
                .entry(customer.route.clone())
                .or_insert_with(|| RouteInfo {
                    name: customer.route.clone(),
                    customers: 0,
                    outstanding: 0.0,
                });
            info.customers += 1;
            info.outstanding = round_cents(info.outstanding + customer.outstanding_amount);
        }
        Ok(routes.into_values().collect())
    }

    /// Posted invoices in posting order
    pub fn invoices(&self, customer_id: Option<&str>) -> Result<Vec<Invoice>> {
        let filter = match customer_id {
            Some(id) => Filter::eq("customerId", id),
            None => Filter::all(),
        };
        let mut invoices: Vec<Invoice> = self.store.list(&filter)?;
        invoices.sort_by_key(|i| i.created_at);
        Ok(invoices)
    }

    /// A customer's transactions in posting order
    pub fn transactions(&self, customer_id: &str) -> Result<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> =
            self.store.list(&Filter::eq("customerId", customer_id))?;
        transactions.sort_by_key(|t| (t.created_at, t.kind.posting_rank()));
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    fn ledger(dir: &TempDir) -> Ledger<LocalStore> {
        Ledger::new(LocalStore::open(dir.path()).unwrap())
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(-12.346), -12.35);
    }

    #[test]
    fn test_register_customer_posts_opening_adjustment() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);

        let customer = ledger
            .register_customer(NewCustomer {
                id: Some("asha".to_string()),
                name: "Asha".to_string(),
                route: "north".to_string(),
                opening_balance: 120.0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(customer.outstanding_amount, 120.0);

        let transactions = ledger.transactions("asha").unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionType::Adjustment);
        assert_eq!(transactions[0].balance_change, 120.0);
        assert!(transactions[0].invoice_number.starts_with("ADJ-OPENING-asha-"));
    }

    #[test]
    fn test_register_customer_zero_opening_posts_nothing() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);

        ledger
            .register_customer(NewCustomer {
                id: Some("ravi".to_string()),
                name: "Ravi".to_string(),
                route: "north".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(ledger.transactions("ravi").unwrap().is_empty());
    }

    #[test]
    fn test_register_customer_rejects_blank_name() {
        let dir = TempDir::new().unwrap();
        let err = ledger(&dir)
            .register_customer(NewCustomer {
                name: "  ".to_string(),
                route: "north".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmptyName("Customer")));
    }

    #[test]
    fn test_add_product_rejects_negative_price() {
        let dir = TempDir::new().unwrap();
        let err = ledger(&dir)
            .add_product(NewProduct {
                name: "Milk".to_string(),
                default_price: -1.0,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPrice { .. }));
    }

    #[test]
    fn test_set_customer_price_requires_product() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        ledger
            .register_customer(NewCustomer {
                id: Some("asha".to_string()),
                name: "Asha".to_string(),
                route: "north".to_string(),
                ..Default::default()
            })
            .unwrap();

        let err = ledger.set_customer_price("asha", "ghee", 10.0).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "Product", .. }));
    }

    #[test]
    fn test_routes_summarize_customers() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let customers = [("a", "north", 10.0), ("b", "north", 5.5), ("c", "south", 0.0)];
        for (id, route, opening) in customers {
            ledger
                .register_customer(NewCustomer {
                    id: Some(id.to_string()),
                    name: id.to_uppercase(),
                    route: route.to_string(),
                    opening_balance: opening,
                    ..Default::default()
                })
                .unwrap();
        }

        let routes = ledger.routes().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name, "north");
        assert_eq!(routes[0].customers, 2);
        assert_eq!(routes[0].outstanding, 15.5);
        assert_eq!(routes[1].customers, 1);
    }
}
