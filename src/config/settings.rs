use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub business: BusinessSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    /// Present only when records live in the hosted table service
    #[serde(default)]
    pub remote: Option<RemoteSettings>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BusinessSettings {
    pub name: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StorageSettings {
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteSettings {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}
