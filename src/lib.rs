pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod store;

pub use config::{load_config, Config};
pub use error::{ConsistencyCheck, LedgerError, Result};
pub use ledger::{CloseSummary, CustomerOutcome, Ledger, StatementLine};
pub use store::{Backend, Filter, LocalStore, Record, RemoteStore, Store};
