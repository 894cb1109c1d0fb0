use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub default_price: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Product {
    const COLLECTION: &'static str = "products";
    const ENTITY: &'static str = "Product";
    const DECIMAL_FIELDS: &'static [&'static str] = &["defaultPrice"];

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub id: Option<String>,
    pub name: String,
    pub default_price: f64,
    pub unit: Option<String>,
}
