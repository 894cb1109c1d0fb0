use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::store::{Filter, Patch, Record, Store};

/// On-disk key/value store.
///
/// Each entity type lives under a fixed namespace key (`routebook_customers`,
/// `routebook_sheets`, ...) as a JSON array of records in their native shape.
/// Every call reads the file again; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

/// Storage key for a record type
pub fn namespace<R: Record>() -> String {
    format!("routebook_{}", R::COLLECTION)
}

impl LocalStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| LedgerError::backend(format!("create {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path<R: Record>(&self) -> PathBuf {
        self.dir.join(format!("{}.json", namespace::<R>()))
    }

    fn load<R: Record>(&self) -> Result<Vec<Value>> {
        let path = self.path::<R>();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| LedgerError::backend(format!("read {}", namespace::<R>()), e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| LedgerError::backend(format!("parse {}", namespace::<R>()), e))
    }

    fn save<R: Record>(&self, rows: &[Value]) -> Result<()> {
        let path = self.path::<R>();
        let content = serde_json::to_string_pretty(rows)
            .map_err(|e| LedgerError::backend(format!("encode {}", namespace::<R>()), e))?;

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| LedgerError::backend(format!("write {}", namespace::<R>()), e))
    }

    fn decode<R: Record>(row: Value) -> Result<R> {
        serde_json::from_value(row)
            .map_err(|e| LedgerError::backend(format!("decode {}", namespace::<R>()), e))
    }

    fn position(rows: &[Value], id: &str) -> Option<usize> {
        rows.iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }
}

impl Store for LocalStore {
    fn get<R: Record>(&self, id: &str) -> Result<R> {
        let mut rows = self.load::<R>()?;
        let idx = Self::position(&rows, id).ok_or_else(|| LedgerError::not_found(R::ENTITY, id))?;
        Self::decode(rows.swap_remove(idx))
    }

    fn list<R: Record>(&self, filter: &Filter) -> Result<Vec<R>> {
        self.load::<R>()?
            .into_iter()
            .filter(|row| filter.matches(row))
            .map(Self::decode)
            .collect()
    }

    fn create<R: Record>(&self, record: &R) -> Result<R> {
        let mut rows = self.load::<R>()?;
        if Self::position(&rows, record.id()).is_some() {
            return Err(LedgerError::backend(
                format!("create {}", namespace::<R>()),
                format!("duplicate id '{}'", record.id()),
            ));
        }
        let row = serde_json::to_value(record)
            .map_err(|e| LedgerError::backend(format!("encode {}", namespace::<R>()), e))?;
        rows.push(row.clone());
        self.save::<R>(&rows)?;
        debug!(collection = R::COLLECTION, id = record.id(), "Created local record");
        Self::decode(row)
    }

    fn update<R: Record>(&self, id: &str, patch: Patch) -> Result<()> {
        let mut rows = self.load::<R>()?;
        let idx = Self::position(&rows, id).ok_or_else(|| LedgerError::not_found(R::ENTITY, id))?;

        let mut merged = rows[idx].clone();
        if let Value::Object(fields) = &mut merged {
            fields.extend(patch);
        }
        // Reject patches that would leave a record we can no longer read
        Self::decode::<R>(merged.clone())?;

        rows[idx] = merged;
        self.save::<R>(&rows)?;
        debug!(collection = R::COLLECTION, id, "Updated local record");
        Ok(())
    }

    fn delete<R: Record>(&self, id: &str) -> Result<()> {
        let mut rows = self.load::<R>()?;
        let idx = Self::position(&rows, id).ok_or_else(|| LedgerError::not_found(R::ENTITY, id))?;
        rows.remove(idx);
        self.save::<R>(&rows)?;
        debug!(collection = R::COLLECTION, id, "Deleted local record");
        Ok(())
    }
}
