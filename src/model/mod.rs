mod customer;
mod invoice;
mod product;
mod sheet;
mod transaction;

pub use customer::{Customer, NewCustomer, RouteInfo};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus};
pub use product::{NewProduct, Product};
pub use sheet::{CustomerSnapshot, DeliveryLine, PaymentSplit, SheetRecord, SheetStatus};
pub use transaction::{Transaction, TransactionType};

/// Round to whole cents
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
