use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CreateOrderRequest, RecordPaymentRequest};
use super::repo_types::{NewOrder, NewPayment, Order, OrderItem, OrderStatus, Payment};
use crate::auth::extractors::AuthUser;
use crate::auth::repo_types::Role;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const ORDER_NOT_FOUND: &str = "Order not found";
pub const NOT_A_PARTY: &str = "Not authorized to access this order";
pub const BAD_TRANSITION: &str = "Invalid status transition";

/// How the caller relates to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Supplier,
    Admin,
}

pub fn party_of(order: &Order, user: &AuthUser) -> Option<Party> {
    if order.buyer_id == user.id {
        Some(Party::Buyer)
    } else if order.supplier_id == user.id {
        Some(Party::Supplier)
    } else if user.role == Role::Admin {
        Some(Party::Admin)
    } else {
        None
    }
}

/// Loads an order the caller is allowed to see.
pub async fn visible_order(
    state: &AppState,
    id: Uuid,
    user: &AuthUser,
) -> ApiResult<(Order, Party)> {
    let order = state
        .orders
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(ORDER_NOT_FOUND))?;
    match party_of(&order, user) {
        Some(party) => Ok((order, party)),
        None => {
            warn!(order_id = %id, user_id = %user.id, "order access denied");
            Err(ApiError::forbidden(NOT_A_PARTY))
        }
    }
}

pub async fn create_order(
    state: &AppState,
    buyer: &AuthUser,
    req: CreateOrderRequest,
) -> ApiResult<Order> {
    let Some(supplier_id) = req.supplier_id else {
        return Err(ApiError::validation("Please enter all required fields"));
    };
    if req.items.is_empty() {
        return Err(ApiError::validation("Order must contain at least one item"));
    }

    let mut items = Vec::with_capacity(req.items.len());
    for line in req.items {
        if line.quantity < 1 {
            return Err(ApiError::validation("Quantity must be at least 1"));
        }
        let product = state
            .products
            .find_by_id(line.product_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Product {} not found", line.product_id)))?;
        if product.supplier_id != supplier_id {
            return Err(ApiError::validation(format!(
                "Product {} is not sold by this supplier",
                product.id
            )));
        }
        items.push(OrderItem {
            product_id: product.id,
            quantity: line.quantity,
            price: product.price,
        });
    }

    let order = state
        .orders
        .create(NewOrder {
            buyer_id: buyer.id,
            supplier_id,
            items,
        })
        .await?;
    info!(order_id = %order.id, buyer_id = %buyer.id, total = order.total, "order placed");
    Ok(order)
}

pub async fn list_my_orders(state: &AppState, user: &AuthUser) -> ApiResult<Vec<Order>> {
    let orders = match user.role {
        Role::Supplier => state.orders.list_for_supplier(user.id).await?,
        Role::Buyer | Role::Admin => state.orders.list_for_buyer(user.id).await?,
    };
    Ok(orders)
}

pub async fn change_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    next: OrderStatus,
) -> ApiResult<Order> {
    let (order, party) = visible_order(state, id, user).await?;
    let allowed = match party {
        Party::Supplier => true,
        Party::Buyer => order.status == OrderStatus::Pending && next == OrderStatus::Cancelled,
        Party::Admin => false,
    };
    if !allowed {
        return Err(ApiError::forbidden(NOT_A_PARTY));
    }
    if !order.status.can_become(next) {
        return Err(ApiError::validation(BAD_TRANSITION));
    }

    // Someone else moved it first.
    let updated = state
        .orders
        .set_status(id, order.status, next)
        .await?
        .ok_or_else(|| ApiError::validation(BAD_TRANSITION))?;
    info!(order_id = %id, from = ?order.status, to = ?next, "order status changed");
    Ok(updated)
}

pub async fn record_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    req: RecordPaymentRequest,
) -> ApiResult<Payment> {
    let (order, party) = visible_order(state, order_id, user).await?;
    if party != Party::Buyer {
        return Err(ApiError::forbidden("Only the buyer can record a payment"));
    }
    let Some(amount) = req.amount else {
        return Err(ApiError::validation("Please enter all required fields"));
    };
    if !(amount.is_finite() && amount > 0.0) {
        return Err(ApiError::validation("Amount must be a positive number"));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(ApiError::validation("Order is cancelled"));
    }

    let payment = state
        .orders
        .insert_payment(NewPayment {
            order_id,
            amount,
            method: req.method,
        })
        .await?;
    info!(payment_id = %payment.id, order_id = %order_id, "payment recorded");
    Ok(payment)
}
