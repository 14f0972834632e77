use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{DeletedResponse, ProductModel, CREATE_PRODUCT, DELETED, UPDATE_PRODUCT};
use super::services::product_by_name;
use crate::{
    db::{NewProduct, ProductPatch},
    error::ApiResult,
    images::services::{discard_image, release_on_error, store_image},
    listing::{Collection, ListParams, ProductSort},
    state::AppState,
    validation::{validate_form, FormInput},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:name",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<ProductModel>>> {
    let listing = params.listing::<ProductSort>()?;
    let page = state.store.list_products(&listing).await?;
    let links = state.links();
    Ok(Json(page.map(|p| ProductModel::new(links, p)).into()))
}

#[instrument(skip(state, form))]
pub async fn create_product(
    State(state): State<AppState>,
    form: FormInput,
) -> ApiResult<Json<ProductModel>> {
    let mut values = validate_form(&CREATE_PRODUCT, &form)?;
    let image_url = match form.image {
        Some(upload) => Some(store_image(&state, upload).await?),
        None => None,
    };

    let stored = image_url.clone();

    let created = state
        .store
        .create_product(NewProduct {
            name: values.str("name").unwrap_or_default(),
            price: values.float("price").unwrap_or_default(),
            description: values.str("description"),
            image_url,
        })
        .await;
    let product = release_on_error(&state, stored.as_deref(), created).await?;

    info!(product_id = product.id, name = %product.name, "product created");
    Ok(Json(ProductModel::new(state.links(), product)))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ProductModel>> {
    let product = product_by_name(&state, &name).await?;
    Ok(Json(ProductModel::new(state.links(), product)))
}

#[instrument(skip(state, form))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(name): Path<String>,
    form: FormInput,
) -> ApiResult<Json<ProductModel>> {
    let current = product_by_name(&state, &name).await?;
    let mut values = validate_form(&UPDATE_PRODUCT, &form)?;
    let image_url = match form.image {
        Some(upload) => Some(store_image(&state, upload).await?),
        None => None,
    };
    let stored = image_url.clone();

    let updated = state
        .store
        .update_product(
            current.id,
            ProductPatch {
                name: values.str("name"),
                price: values.float("price"),
                description: values.str("description"),
                image_url,
            },
        )
        .await;
    let product = release_on_error(&state, stored.as_deref(), updated).await?;

    if stored.is_some() {
        discard_image(&state, &current.image_url).await;
    }
    info!(product_id = product.id, name = %product.name, "product updated");
    Ok(Json(ProductModel::new(state.links(), product)))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let product = product_by_name(&state, &name).await?;
    state.store.delete_product(product.id).await?;
    discard_image(&state, &product.image_url).await;
    info!(product_id = product.id, %name, "product deleted");
    Ok(Json(DELETED))
}
