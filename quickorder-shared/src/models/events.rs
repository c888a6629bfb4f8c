use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    Placed,
    StatusChanged,
}

/// Published on the admin order feed whenever an order is placed or moves state.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    pub order_id: Uuid,
    pub order_number: String,
    /// Status after the event, lowercase wire name.
    pub status: String,
    pub previous_status: Option<String>,
    pub total_amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn placed(order_id: Uuid, order_number: &str, status: &str, total_amount: Decimal) -> Self {
        Self {
            kind: OrderEventKind::Placed,
            order_id,
            order_number: order_number.to_string(),
            status: status.to_string(),
            previous_status: None,
            total_amount,
            occurred_at: Utc::now(),
        }
    }

    pub fn status_changed(
        order_id: Uuid,
        order_number: &str,
        from: &str,
        to: &str,
        total_amount: Decimal,
    ) -> Self {
        Self {
            kind: OrderEventKind::StatusChanged,
            order_id,
            order_number: order_number.to_string(),
            status: to.to_string(),
            previous_status: Some(from.to_string()),
            total_amount,
            occurred_at: Utc::now(),
        }
    }
}
