use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::{OrderStatus, PaymentMethod};

#[derive(Debug, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Option<f64>,
    #[serde(default)]
    pub method: PaymentMethod,
}
