use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{NewProduct, ProductChanges};
use crate::error::{ApiError, ApiResult};

pub const MISSING_FIELDS: &str = "Please enter all required fields";

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedProduct {
    pub message: &'static str,
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn check_price(price: f64) -> ApiResult<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(ApiError::validation("Price must be a positive number"))
    }
}

fn check_stock(stock: i32) -> ApiResult<i32> {
    if stock >= 0 {
        Ok(stock)
    } else {
        Err(ApiError::validation("Stock cannot be negative"))
    }
}

impl CreateProductRequest {
    pub fn into_new(self, supplier_id: Uuid) -> ApiResult<NewProduct> {
        let (Some(name), Some(category), Some(description), Some(price)) = (
            trimmed(self.name),
            trimmed(self.category),
            trimmed(self.description),
            self.price,
        ) else {
            return Err(ApiError::validation(MISSING_FIELDS));
        };
        Ok(NewProduct {
            supplier_id,
            name,
            category,
            description,
            price: check_price(price)?,
            stock: check_stock(self.stock.unwrap_or(0))?,
            image: trimmed(self.image),
        })
    }
}

impl UpdateProductRequest {
    /// Blank strings are rejected rather than silently ignored.
    pub fn into_changes(self) -> ApiResult<ProductChanges> {
        let non_blank = |field: &str, v: Option<String>| -> ApiResult<Option<String>> {
            match v {
                Some(s) if s.trim().is_empty() => {
                    Err(ApiError::validation(format!("{field} cannot be empty")))
                }
                other => Ok(other.map(|s| s.trim().to_string())),
            }
        };
        Ok(ProductChanges {
            name: non_blank("name", self.name)?,
            category: non_blank("category", self.category)?,
            description: non_blank("description", self.description)?,
            price: self.price.map(check_price).transpose()?,
            stock: self.stock.map(check_stock).transpose()?,
            image: trimmed(self.image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(price: Option<f64>, stock: Option<i32>) -> CreateProductRequest {
        CreateProductRequest {
            name: Some(" Maize ".into()),
            category: Some("grain".into()),
            description: Some("90kg bag".into()),
            price,
            stock,
            image: Some("".into()),
        }
    }

    #[test]
    fn create_trims_and_defaults_stock() {
        let p = create(Some(3500.0), None).into_new(Uuid::nil()).unwrap();
        assert_eq!(p.name, "Maize");
        assert_eq!(p.stock, 0);
        assert_eq!(p.image, None);
    }

    #[test]
    fn create_requires_price() {
        let err = create(None, None).into_new(Uuid::nil()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == MISSING_FIELDS));
    }

    #[test]
    fn create_rejects_bad_numbers() {
        assert!(create(Some(0.0), None).into_new(Uuid::nil()).is_err());
        assert!(create(Some(f64::NAN), None).into_new(Uuid::nil()).is_err());
        assert!(create(Some(1.0), Some(-1)).into_new(Uuid::nil()).is_err());
    }

    #[test]
    fn update_rejects_blank_name() {
        let req = UpdateProductRequest {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert!(req.into_changes().is_err());
    }

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination {
            limit: 10_000,
            offset: -5,
        };
        assert_eq!(p.clamped(), (100, 0));
    }
}
