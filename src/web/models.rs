use serde::{Deserialize, Serialize};

use crate::core::{Record, Value};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

pub const ORDER_STATUSES: &[&str] = &[
    "pending",
    "confirmed",
    "processing",
    "shipped",
    "delivered",
    "cancelled",
];

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Record,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    /// `1`/`true`, `0`/`false`, or `all`. Defaults to active products only.
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
    pub active: Option<bool>,
}

impl UpdateProductRequest {
    pub fn into_assignments(self) -> Vec<(String, Value)> {
        let mut assignments = Vec::new();
        let mut push = |field: &str, value: Option<Value>| {
            if let Some(value) = value {
                assignments.push((field.to_string(), value));
            }
        };
        push("name", self.name.map(|v| Value::Text(v.trim().to_string())));
        push("description", self.description.map(Value::Text));
        push("price", self.price.map(Value::Float));
        push("category", self.category.map(Value::Text));
        push("image_url", self.image_url.map(Value::Text));
        push("stock", self.stock.map(Value::Integer));
        push("active", self.active.map(Value::Boolean));
        assignments
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Value,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Order record with its line items nested under `items`.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Record,
    pub items: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl UpdateProfileRequest {
    pub fn into_assignments(self) -> Vec<(String, Value)> {
        [
            ("name", self.name.map(|v| v.trim().to_string())),
            ("phone", self.phone),
            ("address", self.address),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field.to_string(), Value::Text(v))))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email_orders: bool,
    pub email_promotions: bool,
    pub sms_orders: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_orders: true,
            email_promotions: false,
            sms_orders: false,
        }
    }
}

impl NotificationPreferences {
    pub fn from_record(record: &Record) -> Self {
        let defaults = Self::default();
        Self {
            email_orders: record.get_bool("email_orders").unwrap_or(defaults.email_orders),
            email_promotions: record
                .get_bool("email_promotions")
                .unwrap_or(defaults.email_promotions),
            sms_orders: record.get_bool("sms_orders").unwrap_or(defaults.sms_orders),
        }
    }

    pub fn apply(mut self, update: UpdateNotificationsRequest) -> Self {
        if let Some(v) = update.email_orders {
            self.email_orders = v;
        }
        if let Some(v) = update.email_promotions {
            self.email_promotions = v;
        }
        if let Some(v) = update.sms_orders {
            self.sms_orders = v;
        }
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNotificationsRequest {
    pub email_orders: Option<bool>,
    pub email_promotions: Option<bool>,
    pub sms_orders: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct PeriodStats {
    pub orders: u64,
    pub revenue: f64,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub daily: PeriodStats,
    pub weekly: PeriodStats,
    pub users: u64,
    pub products: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_update_only_assigns_given_fields() {
        let update = UpdateProductRequest {
            name: Some("  Saw ".into()),
            active: Some(false),
            ..Default::default()
        };
        assert_eq!(
            update.into_assignments(),
            vec![
                ("name".to_string(), Value::Text("Saw".into())),
                ("active".to_string(), Value::Boolean(false)),
            ]
        );
    }

    #[test]
    fn notification_defaults_fill_missing_fields() {
        let record = Record::new().with("sms_orders", true);
        let prefs = NotificationPreferences::from_record(&record);
        assert!(prefs.email_orders);
        assert!(prefs.sms_orders);
        assert!(!prefs.email_promotions);

        let prefs = prefs.apply(UpdateNotificationsRequest {
            email_orders: Some(false),
            ..Default::default()
        });
        assert!(!prefs.email_orders);
    }
}
