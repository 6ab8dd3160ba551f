//! Core row types and the order status state machine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::{Actor, Role};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub unit: String,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub client_id: Uuid,
    pub admin_id: Uuid,
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub service_fee: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub delivery_address: String,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Orders are visible to their buyer and seller only.
    pub fn authorize_view(&self, actor: &Actor) -> Result<(), ApiError> {
        if actor.id == self.client_id || actor.id == self.admin_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Unauthorized to view this order"))
        }
    }
}

// =============================================================================
// Order status state machine
// =============================================================================

/// Stored as lowercase TEXT; `pending` is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Completed,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Legal forward transitions. Nothing is reversible; compensation (e.g.
    /// restocking) is an explicit separate action, never implied by the move.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Shipped)
                | (Confirmed, Completed)
                | (Processing, Shipped)
                | (Processing, Completed)
                | (Shipped, Completed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ApiError::InvalidRequest(format!("Unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

/// Checks both the transition table and the actor rules for a status change.
///
/// The seller drives every move; the buyer may only cancel while the order is
/// still pending. A status change is a trusted administrative action and does
/// not re-validate stock.
pub fn authorize_transition(
    order: &Order,
    actor: &Actor,
    next: OrderStatus,
) -> Result<OrderStatus, ApiError> {
    let current = OrderStatus::from_str(&order.status)?;

    if actor.id != order.client_id && actor.id != order.admin_id {
        return Err(ApiError::Forbidden("Unauthorized to update this order"));
    }
    if !current.can_transition(next) {
        return Err(ApiError::InvalidRequest(format!(
            "Cannot move order from '{current}' to '{next}'"
        )));
    }

    let is_seller = actor.id == order.admin_id && actor.role == Role::Admin;
    let buyer_cancel = actor.id == order.client_id
        && current == OrderStatus::Pending
        && next == OrderStatus::Cancelled;
    if is_seller || buyer_cancel {
        Ok(current)
    } else {
        Err(ApiError::Forbidden("Only the supplier can update this order status"))
    }
}
