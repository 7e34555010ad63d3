//! Work-order lifecycle
//!
//! `planned → in_progress → qc_pending → completed`, with `qc_rejected`
//! looping back to `in_progress` through rework. [`transition`] is pure; the
//! [`WorkOrderClient`] checks it before sending any command so illegal moves
//! never reach the server.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{path_segment, ApiClient};
use crate::auth::SessionProvider;
use crate::error::{Error, Result};
use crate::offline::TransactionPayload;
use crate::util::normalize_text_option;

const WORK_ORDERS_PATH: &str = "/work-orders";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Planned,
    InProgress,
    QcPending,
    QcRejected,
    Completed,
}

impl WorkOrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::QcPending => "qc_pending",
            Self::QcRejected => "qc_rejected",
            Self::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands a user can issue against a work order.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOrderEvent {
    Start,
    IssueMaterials { item_id: String, quantity: f64 },
    RecordProduction { quantity: f64, scrap_quantity: f64 },
    SubmitForQc,
    QcApprove,
    QcReject { reason: String },
    Rework,
}

impl WorkOrderEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::IssueMaterials { .. } => "issue-materials",
            Self::RecordProduction { .. } => "record-production",
            Self::SubmitForQc => "submit-qc",
            Self::QcApprove => "qc-approve",
            Self::QcReject { .. } => "qc-reject",
            Self::Rework => "rework",
        }
    }

    /// Queueable form of the event, for commands the offline queue carries.
    pub fn offline_payload(&self, work_order_id: &str) -> Option<TransactionPayload> {
        match self {
            Self::IssueMaterials { item_id, quantity } => Some(TransactionPayload::MaterialIssue {
                work_order_id: work_order_id.to_string(),
                item_id: item_id.clone(),
                quantity: *quantity,
            }),
            Self::RecordProduction {
                quantity,
                scrap_quantity,
            } => Some(TransactionPayload::ProductionRecord {
                work_order_id: work_order_id.to_string(),
                quantity_produced: *quantity,
                scrap_quantity: *scrap_quantity,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Cannot {event} a work order that is {from}")]
    Illegal {
        from: WorkOrderStatus,
        event: &'static str,
    },

    #[error("Quantity must be a finite number greater than zero")]
    NonPositiveQuantity,

    #[error("Quantity {requested} exceeds the remaining {remaining}")]
    ExceedsRemaining { requested: f64, remaining: f64 },

    #[error("A rejection reason is required")]
    MissingReason,
}

/// Next status for `event`, or why the move is illegal.
pub fn transition(
    status: WorkOrderStatus,
    event: &WorkOrderEvent,
) -> std::result::Result<WorkOrderStatus, TransitionError> {
    use WorkOrderEvent as E;
    use WorkOrderStatus as S;

    match (status, event) {
        (S::Planned, E::Start)
        | (S::InProgress, E::IssueMaterials { .. } | E::RecordProduction { .. })
        | (S::QcRejected, E::Rework) => Ok(S::InProgress),
        (S::InProgress, E::SubmitForQc) => Ok(S::QcPending),
        (S::QcPending, E::QcApprove) => Ok(S::Completed),
        (S::QcPending, E::QcReject { .. }) => Ok(S::QcRejected),
        (from, event) => Err(TransitionError::Illegal {
            from,
            event: event.name(),
        }),
    }
}

/// Reject non-positive, non-finite, or over-remaining quantities.
pub fn validate_quantity(
    requested: f64,
    remaining: f64,
) -> std::result::Result<f64, TransitionError> {
    if !requested.is_finite() || requested <= 0.0 {
        return Err(TransitionError::NonPositiveQuantity);
    }
    if requested > remaining {
        return Err(TransitionError::ExceedsRemaining {
            requested,
            remaining,
        });
    }
    Ok(requested)
}

/// Server snapshot of a work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    #[serde(default)]
    pub work_order_number: Option<String>,
    pub item_id: String,
    pub planned_quantity: f64,
    #[serde(default)]
    pub produced_quantity: f64,
    pub status: WorkOrderStatus,
}

impl WorkOrder {
    pub fn remaining_quantity(&self) -> f64 {
        (self.planned_quantity - self.produced_quantity).max(0.0)
    }

    pub fn display_name(&self) -> &str {
        self.work_order_number.as_deref().unwrap_or(&self.id)
    }

    /// Full local check of `event`, including its arguments.
    pub fn check(
        &self,
        event: &WorkOrderEvent,
    ) -> std::result::Result<WorkOrderStatus, TransitionError> {
        let next = transition(self.status, event)?;
        match event {
            WorkOrderEvent::RecordProduction { quantity, .. } => {
                validate_quantity(*quantity, self.remaining_quantity())?;
            }
            WorkOrderEvent::IssueMaterials { quantity, .. } => {
                validate_quantity(*quantity, f64::INFINITY)?;
            }
            WorkOrderEvent::QcReject { reason } if reason.trim().is_empty() => {
                return Err(TransitionError::MissingReason);
            }
            _ => {}
        }
        Ok(next)
    }
}

#[derive(Debug, Serialize)]
struct IssueMaterialsRequest<'a> {
    item_id: &'a str,
    quantity: f64,
}

#[derive(Debug, Serialize)]
struct RecordProductionRequest {
    quantity_produced: f64,
    scrap_quantity: f64,
}

#[derive(Debug, Serialize)]
struct QcRejectRequest<'a> {
    reason: &'a str,
}

/// Work-order commands over the functions API.
pub struct WorkOrderClient<P: SessionProvider> {
    api: ApiClient<P>,
}

impl<P: SessionProvider> WorkOrderClient<P> {
    pub const fn new(api: ApiClient<P>) -> Self {
        Self { api }
    }

    pub async fn get(&self, id: &str) -> Result<WorkOrder> {
        let id = normalize_text_option(Some(id.to_string()))
            .ok_or_else(|| Error::InvalidInput("work order id cannot be empty".to_string()))?;
        self.api
            .get(&format!("{WORK_ORDERS_PATH}/{}", path_segment(&id)))
            .await
    }

    pub async fn start(&self, order: &WorkOrder) -> Result<WorkOrder> {
        self.apply(order, &WorkOrderEvent::Start).await
    }

    pub async fn issue_materials(
        &self,
        order: &WorkOrder,
        item_id: &str,
        quantity: f64,
    ) -> Result<WorkOrder> {
        let item_id = normalize_text_option(Some(item_id.to_string()))
            .ok_or_else(|| Error::InvalidInput("item id cannot be empty".to_string()))?;
        self.apply(order, &WorkOrderEvent::IssueMaterials { item_id, quantity })
            .await
    }

    pub async fn record_production(
        &self,
        order: &WorkOrder,
        quantity: f64,
        scrap_quantity: f64,
    ) -> Result<WorkOrder> {
        if !scrap_quantity.is_finite() || scrap_quantity < 0.0 {
            return Err(Error::InvalidInput(
                "scrap quantity cannot be negative".to_string(),
            ));
        }
        self.apply(
            order,
            &WorkOrderEvent::RecordProduction {
                quantity,
                scrap_quantity,
            },
        )
        .await
    }

    pub async fn submit_for_qc(&self, order: &WorkOrder) -> Result<WorkOrder> {
        self.apply(order, &WorkOrderEvent::SubmitForQc).await
    }

    pub async fn qc_approve(&self, order: &WorkOrder) -> Result<WorkOrder> {
        self.apply(order, &WorkOrderEvent::QcApprove).await
    }

    pub async fn qc_reject(&self, order: &WorkOrder, reason: &str) -> Result<WorkOrder> {
        self.apply(
            order,
            &WorkOrderEvent::QcReject {
                reason: reason.trim().to_string(),
            },
        )
        .await
    }

    pub async fn rework(&self, order: &WorkOrder) -> Result<WorkOrder> {
        self.apply(order, &WorkOrderEvent::Rework).await
    }

    async fn apply(&self, order: &WorkOrder, event: &WorkOrderEvent) -> Result<WorkOrder> {
        let expected = order.check(event)?;
        let path = format!(
            "{WORK_ORDERS_PATH}/{}/{}",
            path_segment(&order.id),
            event.name()
        );

        let updated: WorkOrder = match event {
            WorkOrderEvent::IssueMaterials { item_id, quantity } => {
                let body = IssueMaterialsRequest {
                    item_id,
                    quantity: *quantity,
                };
                self.api.post(&path, &body).await?
            }
            WorkOrderEvent::RecordProduction {
                quantity,
                scrap_quantity,
            } => {
                let body = RecordProductionRequest {
                    quantity_produced: *quantity,
                    scrap_quantity: *scrap_quantity,
                };
                self.api.post(&path, &body).await?
            }
            WorkOrderEvent::QcReject { reason } => {
                self.api.post(&path, &QcRejectRequest { reason }).await?
            }
            _ => self.api.post_empty(&path).await?,
        };

        if updated.status != expected {
            tracing::warn!(
                work_order = %order.id,
                expected = %expected,
                actual = %updated.status,
                "Server returned an unexpected work order status"
            );
        }
        tracing::info!(
            work_order = %order.id,
            event = event.name(),
            status = %updated.status,
            "Work order updated"
        );
        Ok(updated)
    }
}
