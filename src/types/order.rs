use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::types::RecordId;
use crate::types::amount::Amount;
use crate::types::coerce;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    New,
    InCart,
    InProgress,
    Done,
    Paid,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NEW" => Self::New,
            "IN_CART" => Self::InCart,
            "IN_PROGRESS" => Self::InProgress,
            "DONE" => Self::Done,
            "PAID" => Self::Paid,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::InCart => "IN_CART",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order as it arrives from `/orders` and `/orders/table/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub id: RecordId,

    #[serde(default)]
    pub status: Option<String>,

    /// Decimal columns come back as strings from some endpoints.
    #[serde(default)]
    pub total_price: Value,

    #[serde(default)]
    pub items: Option<Vec<Value>>,

    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub qr_session_id: Option<RecordId>,
    #[serde(default)]
    pub session_status: Option<String>,

    #[serde(default)]
    pub table_id: Option<RecordId>,
    #[serde(default)]
    pub table_number: Value,

    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub loyalty_points_used: Value,

    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: RecordId,
    pub status: OrderStatus,
    pub total_amount: Amount,
    pub items: Vec<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub qr_session_id: Option<RecordId>,
    pub session_status: Option<String>,
    pub table_id: Option<RecordId>,
    pub table_number: Option<String>,
    pub customer_phone: Option<String>,
    pub loyalty_points_used: i64,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub notes: Option<String>,
}

impl Order {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl From<RawOrder> for Order {
    fn from(raw: RawOrder) -> Self {
        Self {
            id: raw.id,
            status: OrderStatus::parse(raw.status.as_deref().unwrap_or_default()),
            total_amount: Amount::from_json(&raw.total_price),
            items: raw.items.unwrap_or_default(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            qr_session_id: raw.qr_session_id,
            session_status: raw.session_status,
            table_id: raw.table_id,
            table_number: coerce::label(&raw.table_number),
            customer_phone: raw.customer_phone,
            loyalty_points_used: coerce::count(&raw.loyalty_points_used),
            payment_method: raw.payment_method,
            note: raw.note,
            notes: raw.notes,
        }
    }
}
