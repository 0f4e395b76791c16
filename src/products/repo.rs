use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductChanges};

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn insert(&self, product: NewProduct) -> anyhow::Result<Product>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>>;
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Product>>;
    async fn list_by_supplier(&self, supplier_id: Uuid) -> anyhow::Result<Vec<Product>>;
    /// Applies `changes` only if the product belongs to `supplier_id`.
    async fn update_owned(
        &self,
        id: Uuid,
        supplier_id: Uuid,
        changes: ProductChanges,
    ) -> anyhow::Result<Option<Product>>;
    /// Deletes only if the product belongs to `supplier_id`. Returns whether a row went away.
    async fn delete_owned(&self, id: Uuid, supplier_id: Uuid) -> anyhow::Result<bool>;
}

const PRODUCT_COLUMNS: &str =
    "id, supplier_id, name, category, description, price, stock, image, created_at, updated_at";

#[derive(Clone)]
pub struct PgProductRepo {
    db: PgPool,
}

impl PgProductRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepo for PgProductRepo {
    async fn insert(&self, p: NewProduct) -> anyhow::Result<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, supplier_id, name, category, description, price, stock, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(p.supplier_id)
        .bind(&p.name)
        .bind(&p.category)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.stock)
        .bind(&p.image)
        .fetch_one(&self.db)
        .await?;
        Ok(product)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(product)
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_supplier(&self, supplier_id: Uuid) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE supplier_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        supplier_id: Uuid,
        c: ProductChanges,
    ) -> anyhow::Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
               SET name        = COALESCE($3, name),
                   category    = COALESCE($4, category),
                   description = COALESCE($5, description),
                   price       = COALESCE($6, price),
                   stock       = COALESCE($7, stock),
                   image       = COALESCE($8, image),
                   updated_at  = now()
             WHERE id = $1 AND supplier_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(supplier_id)
        .bind(&c.name)
        .bind(&c.category)
        .bind(&c.description)
        .bind(c.price)
        .bind(c.stock)
        .bind(&c.image)
        .fetch_optional(&self.db)
        .await?;
        Ok(product)
    }

    async fn delete_owned(&self, id: Uuid, supplier_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1 AND supplier_id = $2")
            .bind(id)
            .bind(supplier_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}
