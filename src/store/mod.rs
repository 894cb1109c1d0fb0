//! Persistence gateway.
//!
//! Every entity goes through the [`Store`] trait. Two interchangeable
//! backends implement it: [`LocalStore`] keeps one JSON file per entity type
//! on disk, [`RemoteStore`] talks to a hosted REST table service. Which one
//! is used is decided once, from configuration, by [`Backend::from_config`].

mod local;
mod mapping;
mod remote;

pub use local::LocalStore;
pub use mapping::{from_remote, to_camel_case, to_remote, to_snake_case};
pub use remote::RemoteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

use crate::config::{resolve_data_dir, Config};
use crate::error::Result;

/// A typed record stored in its own collection.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection (table) name
    const COLLECTION: &'static str;
    /// Human name used in not-found errors
    const ENTITY: &'static str;
    /// Top-level fields the remote service stores as decimals
    const DECIMAL_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &str;
}

/// Partial update keyed by domain (camelCase) field names
pub type Patch = Map<String, Value>;

/// Build a patch from field/value pairs
pub fn patch<const N: usize>(fields: [(&str, Value); N]) -> Patch {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Conjunction of top-level field equalities. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Check a record in its native (camelCase) JSON shape
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Uniform CRUD over typed records.
pub trait Store {
    /// Fetch one record, failing with `NotFound` if absent
    fn get<R: Record>(&self, id: &str) -> Result<R>;

    fn list<R: Record>(&self, filter: &Filter) -> Result<Vec<R>>;

    /// Insert a new record; the id must not already exist
    fn create<R: Record>(&self, record: &R) -> Result<R>;

    /// Merge `patch` into the stored record
    fn update<R: Record>(&self, id: &str, patch: Patch) -> Result<()>;

    fn delete<R: Record>(&self, id: &str) -> Result<()>;
}

/// The backend selected at startup
pub enum Backend {
    Local(LocalStore),
    Remote(RemoteStore),
}

impl Backend {
    /// Remote when the config has a `[remote]` section, local otherwise
    pub fn from_config(config: &Config, cfg_dir: &Path) -> Result<Self> {
        match &config.remote {
            Some(remote) => {
                tracing::info!(url = %remote.url, "Using remote storage backend");
                Ok(Backend::Remote(RemoteStore::new(remote)))
            }
            None => {
                let dir = resolve_data_dir(&config.storage.data_dir, cfg_dir);
                tracing::info!(dir = %dir.display(), "Using local storage backend");
                Ok(Backend::Local(LocalStore::open(dir)?))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Backend::Local(store) => format!("local ({})", store.dir().display()),
            Backend::Remote(store) => format!("remote ({})", store.base_url()),
        }
    }
}

impl Store for Backend {
    fn get<R: Record>(&self, id: &str) -> Result<R> {
        match self {
            Backend::Local(s) => s.get(id),
            Backend::Remote(s) => s.get(id),
        }
    }

    fn list<R: Record>(&self, filter: &Filter) -> Result<Vec<R>> {
        match self {
            Backend::Local(s) => s.list(filter),
            Backend::Remote(s) => s.list(filter),
        }
    }

    fn create<R: Record>(&self, record: &R) -> Result<R> {
        match self {
            Backend::Local(s) => s.create(record),
            Backend::Remote(s) => s.create(record),
        }
    }

    fn update<R: Record>(&self, id: &str, patch: Patch) -> Result<()> {
        match self {
            Backend::Local(s) => s.update::<R>(id, patch),
            Backend::Remote(s) => s.update::<R>(id, patch),
        }
    }

    fn delete<R: Record>(&self, id: &str) -> Result<()> {
        match self {
            Backend::Local(s) => s.delete::<R>(id),
            Backend::Remote(s) => s.delete::<R>(id),
        }
    }
}
