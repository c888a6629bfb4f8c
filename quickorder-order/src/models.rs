use chrono::{DateTime, Utc};
use quickorder_catalog::{IngredientSelection, LineSnapshot, Temperature};
use quickorder_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::cart::CartOwner;
use crate::manager::OrderError;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Contact and payment details collected at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub delivery_address: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl CustomerDetails {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.name.trim().is_empty() {
            return Err(OrderError::MissingCustomerDetails("customer_name"));
        }
        if self.phone.trim().is_empty() {
            return Err(OrderError::MissingCustomerDetails("customer_phone"));
        }
        Ok(())
    }
}

/// A placed order. Line prices are snapshots and never re-derived from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: Masked<String>,
    pub customer_email: Option<Masked<String>>,
    pub delivery_address: Option<String>,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(owner: &CartOwner, customer: CustomerDetails) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Self {
            id,
            order_number: generate_order_number(now, id),
            user_id: owner.user_id(),
            session_id: owner.session_id().map(str::to_string),
            customer_name: customer.name.trim().to_string(),
            customer_phone: Masked(customer.phone.trim().to_string()),
            customer_email: customer
                .email
                .filter(|e| !e.trim().is_empty())
                .map(Masked),
            delivery_address: customer.delivery_address,
            payment_method: customer.payment_method.unwrap_or_else(|| "cash".to_string()),
            payment_status: PaymentStatus::Pending,
            notes: customer.notes,
            status: OrderStatus::Pending,
            total_amount: Decimal::ZERO,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a snapshotted line to the order
    pub fn add_item(&mut self, snapshot: LineSnapshot) {
        let item = OrderItem::from_snapshot(self.id, snapshot);
        self.total_amount += item.line_total;
        self.items.push(item);
        self.updated_at = Utc::now();
    }

    /// Sum of stored line totals.
    pub fn calculate_total(&self) -> Decimal {
        self.items.iter().map(|item| item.line_total).sum()
    }

    pub fn is_owned_by(&self, owner: &CartOwner) -> bool {
        match owner {
            CartOwner::User(id) => self.user_id == Some(*id),
            CartOwner::Guest(session) => self.session_id.as_deref() == Some(session.as_str()),
        }
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// `ORD-YYYYMMDD-XXXXXXXX`, the suffix taken from the order id.
fn generate_order_number(now: DateTime<Utc>, id: Uuid) -> String {
    let suffix: String = id.simple().to_string().chars().take(8).collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix.to_uppercase())
}

/// One frozen line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    pub temperature: Temperature,
    pub ingredients: Vec<IngredientSelection>,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn from_snapshot(order_id: Uuid, snapshot: LineSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id: snapshot.product_id,
            product_name: snapshot.product_name,
            unit_price: snapshot.unit_price,
            quantity: snapshot.quantity,
            line_total: snapshot.line_total,
            temperature: snapshot.temperature,
            ingredients: snapshot.ingredients,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: " Mei ".to_string(),
            phone: "0912345678".to_string(),
            email: Some("".to_string()),
            delivery_address: None,
            payment_method: None,
            notes: None,
        }
    }

    #[test]
    fn test_order_number_format() {
        let order = Order::new(&CartOwner::Guest("abc".into()), customer());
        let parts: Vec<&str> = order.order_number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], order.created_at.format("%Y%m%d").to_string());
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[2], parts[2].to_uppercase());
    }

    #[test]
    fn test_new_order_defaults() {
        let order = Order::new(&CartOwner::Guest("abc".into()), customer());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.payment_method, "cash");
        assert_eq!(order.customer_name, "Mei");
        assert!(order.customer_email.is_none());
        assert_eq!(order.session_id.as_deref(), Some("abc"));
        assert!(order.user_id.is_none());
        assert!(order.is_owned_by(&CartOwner::Guest("abc".into())));
        assert!(!order.is_owned_by(&CartOwner::Guest("xyz".into())));
    }

    #[test]
    fn test_status_wire_names() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_customer_details_require_name_and_phone() {
        let mut details = customer();
        details.phone = "  ".into();
        assert!(matches!(
            details.validate(),
            Err(OrderError::MissingCustomerDetails("customer_phone"))
        ));
    }
}
