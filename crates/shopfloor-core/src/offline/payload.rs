//! Typed transaction payloads.
//!
//! On the wire a transaction is a `transaction_type` tag plus an opaque
//! `transaction_data` string. Inside the client it is one of a closed set of
//! variants, validated before it is queued and when it is read back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const KNOWN_TYPES: [&str; 5] = [
    "test",
    "material_issue",
    "production_record",
    "stock_adjustment",
    "qc_inspection",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Unknown transaction type '{0}'")]
    UnknownType(String),
    #[error("Malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },
    #[error("Invalid {kind} payload: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transaction_type", content = "data", rename_all = "snake_case")]
pub enum TransactionPayload {
    /// Synthetic entry used to exercise the queue end to end
    Test { message: String },
    MaterialIssue {
        work_order_id: String,
        item_id: String,
        quantity: f64,
    },
    ProductionRecord {
        work_order_id: String,
        quantity_produced: f64,
        #[serde(default)]
        scrap_quantity: f64,
    },
    StockAdjustment {
        item_id: String,
        warehouse_id: String,
        quantity_delta: f64,
        reason: String,
    },
    QcInspection {
        work_order_id: String,
        passed: bool,
        #[serde(default)]
        remarks: Option<String>,
    },
}

impl TransactionPayload {
    pub fn test(message: impl Into<String>) -> Self {
        Self::Test {
            message: message.into(),
        }
    }

    /// The `transaction_type` tag for this variant.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Test { .. } => "test",
            Self::MaterialIssue { .. } => "material_issue",
            Self::ProductionRecord { .. } => "production_record",
            Self::StockAdjustment { .. } => "stock_adjustment",
            Self::QcInspection { .. } => "qc_inspection",
        }
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        let kind = self.kind();
        let invalid = |reason: &str| PayloadError::Invalid {
            kind,
            reason: reason.to_string(),
        };

        match self {
            Self::Test { message } => {
                if message.trim().is_empty() {
                    return Err(invalid("message must not be empty"));
                }
            }
            Self::MaterialIssue {
                work_order_id,
                item_id,
                quantity,
            } => {
                require_id(work_order_id, "work_order_id").map_err(|r| invalid(&r))?;
                require_id(item_id, "item_id").map_err(|r| invalid(&r))?;
                require_positive(*quantity, "quantity").map_err(|r| invalid(&r))?;
            }
            Self::ProductionRecord {
                work_order_id,
                quantity_produced,
                scrap_quantity,
            } => {
                require_id(work_order_id, "work_order_id").map_err(|r| invalid(&r))?;
                require_positive(*quantity_produced, "quantity_produced")
                    .map_err(|r| invalid(&r))?;
                if !scrap_quantity.is_finite() || *scrap_quantity < 0.0 {
                    return Err(invalid("scrap_quantity must be zero or more"));
                }
            }
            Self::StockAdjustment {
                item_id,
                warehouse_id,
                quantity_delta,
                reason,
            } => {
                require_id(item_id, "item_id").map_err(|r| invalid(&r))?;
                require_id(warehouse_id, "warehouse_id").map_err(|r| invalid(&r))?;
                if !quantity_delta.is_finite() || *quantity_delta == 0.0 {
                    return Err(invalid("quantity_delta must be a non-zero number"));
                }
                if reason.trim().is_empty() {
                    return Err(invalid("reason is required"));
                }
            }
            Self::QcInspection { work_order_id, .. } => {
                require_id(work_order_id, "work_order_id").map_err(|r| invalid(&r))?;
            }
        }
        Ok(())
    }

    /// Short human-readable description for listings.
    pub fn summary(&self) -> String {
        match self {
            Self::Test { message } => message.clone(),
            Self::MaterialIssue {
                work_order_id,
                item_id,
                quantity,
            } => format!("issue {quantity} x {item_id} to {work_order_id}"),
            Self::ProductionRecord {
                work_order_id,
                quantity_produced,
                scrap_quantity,
            } => format!("{work_order_id}: produced {quantity_produced}, scrap {scrap_quantity}"),
            Self::StockAdjustment {
                item_id,
                warehouse_id,
                quantity_delta,
                reason,
            } => format!("{item_id} @ {warehouse_id}: {quantity_delta:+} ({reason})"),
            Self::QcInspection {
                work_order_id,
                passed,
                ..
            } => format!(
                "{work_order_id}: QC {}",
                if *passed { "passed" } else { "failed" }
            ),
        }
    }

    /// Validate and split into `(transaction_type, transaction_data)`.
    pub fn encode(&self) -> Result<(String, String), PayloadError> {
        self.validate()?;
        let tagged = serde_json::to_value(self).map_err(|error| PayloadError::Malformed {
            kind: self.kind().to_string(),
            reason: error.to_string(),
        })?;
        let data = tagged
            .get("data")
            .map_or_else(|| "{}".to_string(), serde_json::Value::to_string);
        Ok((self.kind().to_string(), data))
    }

    /// Parse and validate a stored payload.
    pub fn decode(transaction_type: &str, transaction_data: &str) -> Result<Self, PayloadError> {
        let kind = transaction_type.trim();
        if !KNOWN_TYPES.contains(&kind) {
            return Err(PayloadError::UnknownType(kind.to_string()));
        }
        let malformed = |reason: String| PayloadError::Malformed {
            kind: kind.to_string(),
            reason,
        };

        let data: serde_json::Value =
            serde_json::from_str(transaction_data).map_err(|error| malformed(error.to_string()))?;
        let tagged = serde_json::json!({ "transaction_type": kind, "data": data });
        let payload: Self =
            serde_json::from_value(tagged).map_err(|error| malformed(error.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }
}

fn require_id(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

fn require_positive(value: f64, field: &str) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{field} must be greater than zero"))
    }
}
