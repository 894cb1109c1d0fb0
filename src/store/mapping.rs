//! Field-name translation between domain records and remote rows.
//!
//! Only top-level keys are translated. Nested objects keep their keys as-is,
//! since map-valued columns (product prices, delivery data) are keyed by ids.

use serde_json::{Map, Number, Value};

use crate::error::{LedgerError, Result};
use crate::store::Record;

/// `outstandingAmount` -> `outstanding_amount`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `outstanding_amount` -> `outstandingAmount`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn rename_keys(map: Map<String, Value>, rename: fn(&str) -> String) -> Map<String, Value> {
    map.into_iter().map(|(k, v)| (rename(&k), v)).collect()
}

/// Convert a native record (or patch) to the remote row shape
pub fn to_remote(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(rename_keys(map, to_snake_case)),
        other => other,
    }
}

/// Convert a remote row back into a typed record.
///
/// Decimal columns may come back as strings; they are parsed to f64 before
/// the row is validated by deserializing it.
pub fn from_remote<R: Record>(row: Value) -> Result<R> {
    let map = match row {
        Value::Object(map) => map,
        other => {
            return Err(LedgerError::backend(
                format!("decode {} row", R::COLLECTION),
                format!("expected a JSON object, got {other}"),
            ))
        }
    };

    let mut map = rename_keys(map, to_camel_case);
    for field in R::DECIMAL_FIELDS {
        if let Some(Value::String(raw)) = map.get(*field) {
            let number = raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| {
                    LedgerError::backend(
                        format!("decode {} row", R::COLLECTION),
                        format!("field '{field}' is not a decimal: '{raw}'"),
                    )
                })?;
            map.insert((*field).to_string(), Value::Number(number));
        }
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|e| LedgerError::backend(format!("decode {} row", R::COLLECTION), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Customer;
    use serde_json::json;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_snake_case("outstandingAmount"), "outstanding_amount");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_camel_case("customer_final_balance"), "customerFinalBalance");
        assert_eq!(to_camel_case("type"), "type");
    }

    #[test]
    fn test_to_remote_only_renames_top_level() {
        let value = json!({
            "openingBalance": 10.5,
            "productPrices": {"milkLarge": 25.0}
        });
        let remote = to_remote(value);
        assert_eq!(remote["opening_balance"], json!(10.5));
        assert_eq!(remote["product_prices"]["milkLarge"], json!(25.0));
    }

    #[test]
    fn test_from_remote_parses_decimal_strings() {
        let row = json!({
            "id": "c1",
            "name": "Asha",
            "phone": null,
            "route": "north",
            "opening_balance": "100.25",
            "outstanding_amount": "-12.50",
            "product_prices": {"milk": 24.5},
            "created_at": "2026-01-05T08:00:00+00:00"
        });
        let customer: Customer = from_remote(row).unwrap();
        assert_eq!(customer.opening_balance, 100.25);
        assert_eq!(customer.outstanding_amount, -12.5);
        assert_eq!(customer.product_prices.get("milk"), Some(&24.5));
    }

    #[test]
    fn test_from_remote_rejects_bad_decimal() {
        let row = json!({
            "id": "c1",
            "name": "Asha",
            "route": "north",
            "outstanding_amount": "lots",
            "created_at": "2026-01-05T08:00:00+00:00"
        });
        let err = from_remote::<Customer>(row).unwrap_err();
        assert!(matches!(err, LedgerError::Backend { .. }));
    }
}
