//! Transaction record data structures for fraud classification

use crate::error::PredictError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw fields every record must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "type",
    "amount",
    "oldbalanceOrg",
    "newbalanceOrig",
    "oldbalanceDest",
    "newbalanceDest",
];

/// Known transaction categories, in indicator order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    CashIn,
    CashOut,
    Debit,
    Payment,
    Transfer,
}

impl TransactionType {
    /// All categories that get an indicator feature.
    pub const ALL: [TransactionType; 5] = [
        TransactionType::CashIn,
        TransactionType::CashOut,
        TransactionType::Debit,
        TransactionType::Payment,
        TransactionType::Transfer,
    ];

    /// Category name as it appears on the wire and in the column list
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CashIn => "CASH_IN",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::Debit => "DEBIT",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Transfer => "TRANSFER",
        }
    }

    /// Exact, case-sensitive match against the known category names.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// A single transaction as submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// Transaction category. Unknown values are kept verbatim.
    #[serde(rename = "type")]
    pub kind: String,

    /// Transferred amount
    pub amount: f64,

    /// Originator balance before the transaction
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_orig: f64,

    /// Originator balance after the transaction
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_orig: f64,

    /// Recipient balance before the transaction
    #[serde(rename = "oldbalanceDest")]
    pub old_balance_dest: f64,

    /// Recipient balance after the transaction
    #[serde(rename = "newbalanceDest")]
    pub new_balance_dest: f64,

    /// Fields the caller sent beyond the required ones (ids, `step`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TransactionRecord {
    /// Create a record with no extra fields
    pub fn new(
        kind: impl Into<String>,
        amount: f64,
        old_balance_orig: f64,
        new_balance_orig: f64,
        old_balance_dest: f64,
        new_balance_dest: f64,
    ) -> Self {
        Self {
            kind: kind.into(),
            amount,
            old_balance_orig,
            new_balance_orig,
            old_balance_dest,
            new_balance_dest,
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra field
    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Parse the record at `index` of a request batch.
    ///
    /// Field-level problems are client faults carrying the record index and
    /// field name, so callers can tell which record to fix.
    pub fn from_json(index: usize, value: &Value) -> Result<Self, PredictError> {
        let object = value.as_object().ok_or_else(|| PredictError::InvalidRecord {
            index,
            reason: format!("expected a JSON object, got {}", json_kind(value)),
        })?;

        let kind = match required(object, index, "type")? {
            Value::String(s) => s.clone(),
            other => {
                return Err(PredictError::InvalidField {
                    index,
                    field: "type".to_string(),
                    reason: format!("expected a string, got {}", json_kind(other)),
                })
            }
        };

        let extra = object
            .iter()
            .filter(|(name, _)| !REQUIRED_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Self {
            kind,
            amount: numeric(object, index, "amount")?,
            old_balance_orig: numeric(object, index, "oldbalanceOrg")?,
            new_balance_orig: numeric(object, index, "newbalanceOrig")?,
            old_balance_dest: numeric(object, index, "oldbalanceDest")?,
            new_balance_dest: numeric(object, index, "newbalanceDest")?,
            extra,
        })
    }

    /// Known category of this record, if any
    pub fn transaction_type(&self) -> Option<TransactionType> {
        TransactionType::parse(&self.kind)
    }

    /// Numeric value of an extra field.
    pub fn extra_numeric(&self, index: usize, field: &str) -> Result<f64, PredictError> {
        let value = self.extra.get(field).ok_or_else(|| PredictError::MissingField {
            index,
            field: field.to_string(),
        })?;
        as_number(value, index, field)
    }
}

fn required<'a>(object: &'a Map<String, Value>, index: usize, field: &str) -> Result<&'a Value, PredictError> {
    object.get(field).ok_or_else(|| PredictError::MissingField {
        index,
        field: field.to_string(),
    })
}

fn numeric(object: &Map<String, Value>, index: usize, field: &str) -> Result<f64, PredictError> {
    as_number(required(object, index, field)?, index, field)
}

fn as_number(value: &Value, index: usize, field: &str) -> Result<f64, PredictError> {
    value.as_f64().ok_or_else(|| PredictError::InvalidField {
        index,
        field: field.to_string(),
        reason: format!("expected a number, got {}", json_kind(value)),
    })
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer() -> Value {
        json!({
            "type": "TRANSFER",
            "amount": 1000,
            "oldbalanceOrg": 5000,
            "newbalanceOrig": 4000,
            "oldbalanceDest": 2000,
            "newbalanceDest": 3000
        })
    }

    #[test]
    fn test_parse_complete_record() {
        let record = TransactionRecord::from_json(0, &transfer()).unwrap();

        assert_eq!(record.kind, "TRANSFER");
        assert_eq!(record.amount, 1000.0);
        assert_eq!(record.old_balance_orig, 5000.0);
        assert_eq!(record.new_balance_dest, 3000.0);
        assert!(record.extra.is_empty());
        assert_eq!(record.transaction_type(), Some(TransactionType::Transfer));
    }

    #[test]
    fn test_extra_fields_are_kept() {
        let mut value = transfer();
        value["step"] = json!(7);
        value["nameOrig"] = json!("C1231006815");

        let record = TransactionRecord::from_json(0, &value).unwrap();

        assert_eq!(record.extra.len(), 2);
        assert_eq!(record.extra_numeric(0, "step").unwrap(), 7.0);
        assert!(matches!(
            record.extra_numeric(0, "nameOrig"),
            Err(PredictError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_missing_field_names_record_and_field() {
        let mut value = transfer();
        value.as_object_mut().unwrap().remove("oldbalanceOrg");

        let err = TransactionRecord::from_json(3, &value).unwrap_err();

        match err {
            PredictError::MissingField { index, field } => {
                assert_eq!(index, 3);
                assert_eq!(field, "oldbalanceOrg");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrongly_typed_fields_are_rejected() {
        let mut value = transfer();
        value["amount"] = json!("1000");
        assert!(matches!(
            TransactionRecord::from_json(0, &value),
            Err(PredictError::InvalidField { ref field, .. }) if field == "amount"
        ));

        let mut value = transfer();
        value["type"] = json!(4);
        assert!(matches!(
            TransactionRecord::from_json(0, &value),
            Err(PredictError::InvalidField { ref field, .. }) if field == "type"
        ));

        assert!(matches!(
            TransactionRecord::from_json(1, &json!([1, 2])),
            Err(PredictError::InvalidRecord { index: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_accepted() {
        let mut value = transfer();
        value["type"] = json!("unknown_value");

        let record = TransactionRecord::from_json(0, &value).unwrap();
        assert_eq!(record.transaction_type(), None);
        assert_eq!(TransactionType::parse("payment"), None);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let record = TransactionRecord::new("PAYMENT", 9839.64, 170136.0, 160296.36, 0.0, 0.0)
            .with_extra("step", json!(1));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "PAYMENT");
        assert_eq!(json["oldbalanceOrg"], 170136.0);
        assert_eq!(json["step"], 1);

        let parsed = TransactionRecord::from_json(0, &json).unwrap();
        assert_eq!(parsed, record);
    }
}
