use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateProductRequest, DeletedProduct, Pagination, UpdateProductRequest};
use super::repo_types::Product;
use crate::{
    auth::extractors::SupplierUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub const NOT_FOUND: &str = "Product not found";
pub const NOT_OWNER: &str = "Not authorized to modify this product";

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/mine", get(my_products))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult<Json<Vec<Product>>> {
    let Query(page) = page?;
    let (limit, offset) = page.clamped();
    Ok(Json(state.products.list(limit, offset).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Product>> {
    let Path(id) = id?;
    let product = state
        .products
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Json(product))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    SupplierUser(user): SupplierUser,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let Json(payload) = payload?;
    let new = payload.into_new(user.id)?;
    let product = state.products.insert(new).await?;
    info!(product_id = %product.id, supplier_id = %user.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state))]
pub async fn my_products(
    State(state): State<AppState>,
    SupplierUser(user): SupplierUser,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.products.list_by_supplier(user.id).await?))
}

/// Loads the product and checks that `supplier_id` owns it.
async fn owned_product(state: &AppState, id: Uuid, supplier_id: Uuid) -> ApiResult<Product> {
    let product = state
        .products
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    if product.supplier_id != supplier_id {
        warn!(
            product_id = %id,
            owner = %product.supplier_id,
            caller = %supplier_id,
            "not the product owner"
        );
        return Err(ApiError::forbidden(NOT_OWNER));
    }
    Ok(product)
}

#[instrument(skip(state, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    SupplierUser(user): SupplierUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> ApiResult<Json<Product>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    owned_product(&state, id, user.id).await?;
    let changes = payload.into_changes()?;

    // Gone between the check and the write.
    let product = state
        .products
        .update_owned(id, user.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    info!(product_id = %id, supplier_id = %user.id, "product updated");
    Ok(Json(product))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    SupplierUser(user): SupplierUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<DeletedProduct>> {
    let Path(id) = id?;
    owned_product(&state, id, user.id).await?;
    if !state.products.delete_owned(id, user.id).await? {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!(product_id = %id, supplier_id = %user.id, "product deleted");
    Ok(Json(DeletedProduct {
        message: "Product removed",
        id,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::*;
    use crate::app::build_app;
    use crate::auth::handlers::tests::{call, signup_as};

    async fn create(app: &Router, token: &str) -> (StatusCode, Value) {
        call(app, "POST", "/api/v1/products", Some(token), Some(product_body())).await
    }

    fn product_body() -> Value {
        json!({
            "name": "Maize",
            "category": "grain",
            "description": "90kg bag",
            "price": 3500.0,
            "stock": 10
        })
    }

    #[tokio::test]
    async fn supplier_creates_and_lists_own_products() {
        let app = build_app(AppState::fake());
        let (a_id, a) = signup_as(&app, "a@x.com", "supplier").await;
        let (_, b) = signup_as(&app, "b@x.com", "supplier").await;

        let (status, p) = create(&app, &a).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(p["supplier_id"], a_id.as_str());
        assert_eq!(p["stock"], 10);
        create(&app, &b).await;

        let (status, mine) = call(&app, "GET", "/api/v1/products/mine", Some(&a), None).await;
        assert_eq!(status, StatusCode::OK);
        let mine = mine.as_array().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["id"], p["id"]);

        let (_, all) = call(&app, "GET", "/api/v1/products", None, None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_fields_is_400() {
        let app = build_app(AppState::fake());
        let (_, a) = signup_as(&app, "a@x.com", "supplier").await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/products",
            Some(&a),
            Some(json!({"name": "Maize"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please enter all required fields");
    }

    #[tokio::test]
    async fn buyer_cannot_mutate_products() {
        let (state, stores) = AppState::fake_with_stores();
        let app = build_app(state);
        let (_, supplier) = signup_as(&app, "s@x.com", "supplier").await;
        let (_, buyer) = signup_as(&app, "b@x.com", "buyer").await;
        let (_, p) = create(&app, &supplier).await;
        let uri = format!("/api/v1/products/{}", p["id"].as_str().unwrap());

        let (status, body) = create(&app, &buyer).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized as a supplier");

        let (status, _) = call(&app, "PUT", &uri, Some(&buyer), Some(json!({"price": 1.0}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "DELETE", &uri, Some(&buyer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "GET", "/api/v1/products/mine", Some(&buyer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert_eq!(stores.products.len(), 1);
        let id: Uuid = p["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(stores.products.get(id).unwrap().price, 3500.0);
    }

    #[tokio::test]
    async fn mutations_without_token_are_401() {
        let app = build_app(AppState::fake());
        let uri = format!("/api/v1/products/{}", Uuid::new_v4());
        let cases = [
            ("POST", "/api/v1/products"),
            ("GET", "/api/v1/products/mine"),
            ("DELETE", uri.as_str()),
        ];
        for (method, uri) in cases {
            let (status, body) = call(&app, method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["message"], "Not authorized, no token");
        }
    }

    #[tokio::test]
    async fn other_supplier_cannot_delete_or_update() {
        let (state, stores) = AppState::fake_with_stores();
        let app = build_app(state);
        let (_, a) = signup_as(&app, "a@x.com", "supplier").await;
        let (_, b) = signup_as(&app, "b@x.com", "supplier").await;
        let (_, p) = create(&app, &a).await;
        let uri = format!("/api/v1/products/{}", p["id"].as_str().unwrap());

        let (status, body) = call(&app, "DELETE", &uri, Some(&b), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], NOT_OWNER);

        let (status, _) = call(&app, "PUT", &uri, Some(&b), Some(json!({"name": "Stolen"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, still) = call(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(still["name"], "Maize");
        assert_eq!(stores.products.len(), 1);
    }

    #[tokio::test]
    async fn owner_updates_then_deletes() {
        let app = build_app(AppState::fake());
        let (_, a) = signup_as(&app, "a@x.com", "supplier").await;
        let (_, p) = create(&app, &a).await;
        let uri = format!("/api/v1/products/{}", p["id"].as_str().unwrap());

        let (status, updated) =
            call(&app, "PUT", &uri, Some(&a), Some(json!({"price": 3000.0, "stock": 4}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 3000.0);
        assert_eq!(updated["stock"], 4);
        assert_eq!(updated["name"], "Maize");

        let (status, body) = call(&app, "DELETE", &uri, Some(&a), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Product removed");

        let (status, _) = call(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "DELETE", &uri, Some(&a), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_product_id_is_400() {
        let app = build_app(AppState::fake());
        let (status, _) = call(&app, "GET", "/api/v1/products/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
