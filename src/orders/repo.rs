use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewOrder, NewPayment, Order, OrderItem, OrderRow, OrderStatus, Payment};

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn create(&self, order: NewOrder) -> anyhow::Result<Order>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Order>>;
    async fn list_for_buyer(&self, buyer_id: Uuid) -> anyhow::Result<Vec<Order>>;
    async fn list_for_supplier(&self, supplier_id: Uuid) -> anyhow::Result<Vec<Order>>;
    /// Moves the order to `to` only while it is still in `from`.
    async fn set_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> anyhow::Result<Option<Order>>;
    async fn insert_payment(&self, payment: NewPayment) -> anyhow::Result<Payment>;
    async fn list_payments(&self, order_id: Uuid) -> anyhow::Result<Vec<Payment>>;
}

const ORDER_COLUMNS: &str =
    "id, buyer_id, supplier_id, status, payment_status, total, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, order_id, amount, method, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrderRepo {
    db: PgPool,
}

impl PgOrderRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Attaches items to each row, keeping row order.
    async fn with_items(&self, rows: Vec<OrderRow>) -> anyhow::Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items: Vec<(Uuid, Uuid, i32, f64)> = sqlx::query_as(
            r#"
            SELECT order_id, product_id, quantity, price
              FROM order_items
             WHERE order_id = ANY($1)
             ORDER BY position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("load order items")?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for (order_id, product_id, quantity, price) in items {
            by_order.entry(order_id).or_default().push(OrderItem {
                product_id,
                quantity,
                price,
            });
        }
        Ok(rows
            .into_iter()
            .map(|r| {
                let items = by_order.remove(&r.id).unwrap_or_default();
                Order::from_row(r, items)
            })
            .collect())
    }

    async fn one(&self, row: Option<OrderRow>) -> anyhow::Result<Option<Order>> {
        match row {
            Some(r) => Ok(self.with_items(vec![r]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderRepo for PgOrderRepo {
    async fn create(&self, order: NewOrder) -> anyhow::Result<Order> {
        let total = order.total();
        let mut tx = self.db.begin().await.context("begin tx")?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (id, buyer_id, supplier_id, total)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(order.buyer_id)
        .bind(order.supplier_id)
        .bind(total)
        .fetch_one(&mut *tx)
        .await
        .context("insert order")?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await
            .context("insert order item")?;
        }
        tx.commit().await.context("commit tx")?;

        Ok(Order::from_row(row, order.items))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        self.one(row).await
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(buyer_id)
        .fetch_all(&self.db)
        .await?;
        self.with_items(rows).await
    }

    async fn list_for_supplier(&self, supplier_id: Uuid) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE supplier_id = $1 ORDER BY created_at DESC"
        ))
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?;
        self.with_items(rows).await
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
               SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.db)
        .await?;
        self.one(row).await
    }

    async fn insert_payment(&self, p: NewPayment) -> anyhow::Result<Payment> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (id, order_id, amount, method)
            VALUES ($1, $2, $3, $4)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(p.order_id)
        .bind(p.amount)
        .bind(p.method)
        .fetch_one(&self.db)
        .await?;
        Ok(payment)
    }

    async fn list_payments(&self, order_id: Uuid) -> anyhow::Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
