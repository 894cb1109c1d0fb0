use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which arithmetic check a sheet line failed during close.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyCheck {
    /// amountReceived.total against cash + upi
    PaymentSplit,
    /// a delivery line amount against quantity * unit price
    LineAmount { product: String },
    /// the recorded purchase total against the sum of line amounts
    PurchaseTotal,
}

impl fmt::Display for ConsistencyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentSplit => write!(f, "payment total vs cash + upi"),
            Self::LineAmount { product } => write!(f, "line amount for product '{product}'"),
            Self::PurchaseTotal => write!(f, "purchase total vs sum of lines"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Sheet '{0}' is already closed")]
    AlreadyClosed(String),

    #[error(
        "Consistency check failed on sheet '{sheet}' for customer '{customer}': \
         {check} (expected {expected:.2}, got {actual:.2})"
    )]
    Consistency {
        sheet: String,
        customer: String,
        check: ConsistencyCheck,
        expected: f64,
        actual: f64,
    },

    #[error("Storage backend failed during {operation}: {source}")]
    Backend {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config directory not found at {0}. Run 'routebook init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Invalid price {price} for '{item}': must not be negative")]
    InvalidPrice { item: String, price: f64 },

    #[error("Invalid quantity {quantity} for product '{product}': must not be negative")]
    InvalidQuantity { product: String, quantity: f64 },

    #[error("Invalid delivery '{0}'. Expected 'product:quantity' (e.g., 'milk:2')")]
    InvalidDeliveryFormat(String),

    #[error("Invalid {field} amount {amount}: must not be negative")]
    InvalidAmount { field: &'static str, amount: f64 },

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time '{0}'. Expected HH:MM")]
    InvalidTime(String),

    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("Sheet '{0}' already exists")]
    SheetExists(String),

    #[error("Route '{0}' has no customers")]
    EmptyRoute(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn backend<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
