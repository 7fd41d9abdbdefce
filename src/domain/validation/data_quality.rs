use crate::domain::records::{MerchantSnapshot, RawRecord};
use serde_json::Value;
use tracing::warn;

/// Reads a number from a JSON value. Numeric strings are accepted; anything
/// else (including NaN/inf strings) is rejected.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Reads `field` from `record` as a non-negative number.
/// Missing or null fields yield `None`; unparseable ones are logged and yield `None`.
pub fn non_negative_field(record: &RawRecord, field: &str) -> Option<f64> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => match coerce_number(value) {
            Some(number) => Some(number.max(0.0)),
            None => {
                warn!("Validation: invalid {} value {:?}, ignoring", field, value);
                None
            }
        },
    }
}

/// Cleans raw merchant aggregates into a [`MerchantSnapshot`].
pub struct MerchantDataValidator;

impl MerchantDataValidator {
    pub const DEFAULT_CONVERSION_RATE: f64 = 0.02;
    pub const DEFAULT_AOV: f64 = 50.0;

    pub fn validate(data: &RawRecord) -> MerchantSnapshot {
        let merchant_id = match data.get("merchant_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };

        let revenue = non_negative_field(data, "revenue").unwrap_or(0.0);
        let orders = non_negative_field(data, "orders").unwrap_or(0.0);
        let spend = non_negative_field(data, "spend").unwrap_or(0.0);
        let conversion_rate =
            non_negative_field(data, "conversion_rate").unwrap_or(Self::DEFAULT_CONVERSION_RATE);
        let avg_order_value = non_negative_field(data, "avg_order_value").unwrap_or(Self::DEFAULT_AOV);

        let calculated_aov = if orders > 0.0 && revenue > 0.0 {
            revenue / orders
        } else {
            avg_order_value
        };
        let roas = if spend > 0.0 && revenue > 0.0 {
            revenue / spend
        } else {
            0.0
        };

        MerchantSnapshot {
            merchant_id,
            revenue,
            orders,
            spend,
            conversion_rate,
            avg_order_value,
            calculated_aov,
            roas,
        }
    }
}
