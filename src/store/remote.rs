use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

use crate::config::RemoteSettings;
use crate::error::{LedgerError, Result};
use crate::store::{from_remote, to_remote, to_snake_case, Filter, Patch, Record, Store};

/// Client for a hosted REST table service (PostgREST conventions).
///
/// Each collection maps to a table at `{url}/rest/v1/{collection}`. Rows use
/// snake_case column names; the mapping layer converts them on the way in and out.
pub struct RemoteStore {
    agent: Agent,
    base_url: String,
    api_key: String,
}

/// PostgREST equality operand for a filter value
fn eq_operand(value: &Value) -> String {
    match value {
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

impl RemoteStore {
    pub fn new(settings: &RemoteSettings) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs)))
            .build()
            .into();

        Self {
            agent,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url<R: Record>(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, R::COLLECTION)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn encode<R: Record>(record: &R) -> Result<String> {
        let value = serde_json::to_value(record)
            .map_err(|e| LedgerError::backend(format!("encode {}", R::COLLECTION), e))?;
        Ok(to_remote(value).to_string())
    }

    /// Parse a JSON array response into raw rows
    fn rows(operation: &str, body: &str) -> Result<Vec<Value>> {
        serde_json::from_str(body).map_err(|e| LedgerError::backend(operation, e))
    }

    fn fetch<R: Record>(&self, filter: &Filter) -> Result<Vec<Value>> {
        let operation = format!("select {}", R::COLLECTION);
        let mut request = self
            .agent
            .get(&self.table_url::<R>())
            .header("apikey", self.api_key.as_str())
            .header("Authorization", self.bearer())
            .query("select", "*");
        for (field, value) in filter.conditions() {
            request = request.query(to_snake_case(field), eq_operand(value));
        }

        let body = request
            .call()
            .map_err(|e| LedgerError::backend(&operation, e))?
            .body_mut()
            .read_to_string()
            .map_err(|e| LedgerError::backend(&operation, e))?;
        Self::rows(&operation, &body)
    }
}

impl Store for RemoteStore {
    fn get<R: Record>(&self, id: &str) -> Result<R> {
        let row = self
            .fetch::<R>(&Filter::eq("id", id))?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found(R::ENTITY, id))?;
        from_remote(row)
    }

    fn list<R: Record>(&self, filter: &Filter) -> Result<Vec<R>> {
        self.fetch::<R>(filter)?
            .into_iter()
            .map(from_remote)
            .collect()
    }

    fn create<R: Record>(&self, record: &R) -> Result<R> {
        let operation = format!("insert {}", R::COLLECTION);
        let payload = Self::encode(record)?;

        let body = self
            .agent
            .post(&self.table_url::<R>())
            .header("apikey", self.api_key.as_str())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .send(payload.as_str())
            .map_err(|e| LedgerError::backend(&operation, e))?
            .body_mut()
            .read_to_string()
            .map_err(|e| LedgerError::backend(&operation, e))?;

        debug!(collection = R::COLLECTION, id = record.id(), "Inserted remote row");
        let row = Self::rows(&operation, &body)?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::backend(&operation, "insert returned no rows"))?;
        from_remote(row)
    }

    fn update<R: Record>(&self, id: &str, patch: Patch) -> Result<()> {
        let operation = format!("update {}", R::COLLECTION);
        let payload = to_remote(Value::Object(patch)).to_string();

        let body = self
            .agent
            .patch(&self.table_url::<R>())
            .header("apikey", self.api_key.as_str())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .query("id", eq_operand(&Value::from(id)))
            .send(payload.as_str())
            .map_err(|e| LedgerError::backend(&operation, e))?
            .body_mut()
            .read_to_string()
            .map_err(|e| LedgerError::backend(&operation, e))?;

        if Self::rows(&operation, &body)?.is_empty() {
            return Err(LedgerError::not_found(R::ENTITY, id));
        }
        debug!(collection = R::COLLECTION, id, "Updated remote row");
        Ok(())
    }

    fn delete<R: Record>(&self, id: &str) -> Result<()> {
        let operation = format!("delete {}", R::COLLECTION);

        let body = self
            .agent
            .delete(&self.table_url::<R>())
            .header("apikey", self.api_key.as_str())
            .header("Authorization", self.bearer())
            .header("Prefer", "return=representation")
            .query("id", eq_operand(&Value::from(id)))
            .call()
            .map_err(|e| LedgerError::backend(&operation, e))?
            .body_mut()
            .read_to_string()
            .map_err(|e| LedgerError::backend(&operation, e))?;

        if Self::rows(&operation, &body)?.is_empty() {
            return Err(LedgerError::not_found(R::ENTITY, id));
        }
        debug!(collection = R::COLLECTION, id, "Deleted remote row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Customer, Product};
    use crate::store::patch;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> RemoteStore {
        RemoteStore::new(&RemoteSettings {
            url: server.uri(),
            api_key: "secret".to_string(),
            timeout_secs: 5,
        })
    }

    /// Run a blocking store call off the async test thread
    async fn blocking<T, F>(call: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        tokio::task::spawn_blocking(call).await.unwrap()
    }

    fn milk_row() -> Value {
        json!({
            "id": "milk",
            "name": "Milk 500ml",
            "default_price": "25.50",
            "unit": "packet",
            "created_at": "2026-10-19T06:00:00Z"
        })
    }

    #[test]
    fn test_eq_operand() {
        assert_eq!(eq_operand(&json!("c1")), "eq.c1");
        assert_eq!(eq_operand(&json!(12.5)), "eq.12.5");
        assert_eq!(eq_operand(&json!(true)), "eq.true");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = RemoteStore::new(&RemoteSettings {
            url: "https://example.test/".to_string(),
            api_key: "key".to_string(),
            timeout_secs: 5,
        });
        assert_eq!(store.base_url(), "https://example.test");
    }

    #[tokio::test]
    async fn test_get_sends_credentials_and_decodes_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/products"))
            .and(query_param("select", "*"))
            .and(query_param("id", "eq.milk"))
            .and(header("apikey", "secret"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([milk_row()])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let product: Product = blocking(move || store.get("milk")).await.unwrap();
        assert_eq!(product.name, "Milk 500ml");
        assert_eq!(product.default_price, 25.5);
        assert_eq!(product.unit.as_deref(), Some("packet"));
    }

    #[tokio::test]
    async fn test_get_empty_result_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = blocking(move || store.get::<Product>("ghee"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "Product", ref id } if id == "ghee"));
    }

    #[tokio::test]
    async fn test_list_encodes_filter_as_snake_case_columns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/customers"))
            .and(query_param("route", "eq.north"))
            .and(query_param("outstanding_amount", "eq.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "asha",
                "name": "Asha",
                "phone": null,
                "route": "north",
                "opening_balance": "0.00",
                "outstanding_amount": "0.00",
                "product_prices": {"milk": 22.0},
                "created_at": "2026-10-19T06:00:00Z"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let filter = Filter::eq("route", "north").and("outstandingAmount", 0);
        let customers: Vec<Customer> = blocking(move || store.list(&filter)).await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].id, "asha");
        assert_eq!(customers[0].product_prices.get("milk"), Some(&22.0));
    }

    #[tokio::test]
    async fn test_create_posts_snake_case_and_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/products"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!({
                "id": "milk",
                "name": "Milk 500ml",
                "default_price": 25.5,
                "unit": "packet",
                "created_at": "2026-10-19T06:00:00Z"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([milk_row()])))
            .expect(1)
            .mount(&server)
            .await;

        let product = Product {
            id: "milk".to_string(),
            name: "Milk 500ml".to_string(),
            default_price: 25.5,
            unit: Some("packet".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap(),
        };
        let store = store_for(&server);
        let sent = product.clone();
        let created = blocking(move || store.create(&sent)).await.unwrap();
        assert_eq!(created, product);
    }

    #[tokio::test]
    async fn test_update_matching_no_rows_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/customers"))
            .and(query_param("id", "eq.ghost"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!({"outstanding_amount": 12.5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = blocking(move || {
            store.update::<Customer>("ghost", patch([("outstandingAmount", json!(12.5))]))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "Customer", .. }));
    }

    #[tokio::test]
    async fn test_delete_returning_row_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/products"))
            .and(query_param("id", "eq.milk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([milk_row()])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        blocking(move || store.delete::<Product>("milk")).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_maps_to_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/products"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = blocking(move || store.list::<Product>(&Filter::all()))
            .await
            .unwrap_err();
        match err {
            LedgerError::Backend { operation, .. } => assert_eq!(operation, "select products"),
            other => panic!("expected backend error, got {other:?}"),
        }
    }
}
