use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{ReviewModel, CREATE_REVIEW};
use crate::{
    auth::CurrentUser,
    db::{NewReview, Scope},
    error::{ApiError, ApiResult},
    images::services::{release_on_error, store_image},
    listing::{Collection, ListParams, ReviewSort},
    products::services::product_by_name,
    state::AppState,
    validation::{validate_form, FormInput, IdPath},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products/:name/reviews",
            get(list_product_reviews).post(create_review),
        )
        .route("/reviews", get(list_reviews))
        .route("/reviews/:id", get(get_review))
}

/// Shared by every review collection route.
pub async fn review_collection(
    state: &AppState,
    scope: Scope,
    params: &ListParams,
) -> ApiResult<Json<Collection<ReviewModel>>> {
    let listing = params.listing::<ReviewSort>()?;
    let page = state.store.list_reviews(scope, &listing).await?;
    let links = state.links();
    Ok(Json(page.map(|r| ReviewModel::new(links, r)).into()))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<ReviewModel>>> {
    review_collection(&state, Scope::All, &params).await
}

#[instrument(skip(state))]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<ReviewModel>>> {
    let product = product_by_name(&state, &name).await?;
    review_collection(&state, Scope::Product(product.id), &params).await
}

#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<ReviewModel>> {
    let review = state
        .store
        .find_review(id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(Json(ReviewModel::new(state.links(), review)))
}

#[instrument(skip(state, user, form), fields(user_id = user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    form: FormInput,
) -> ApiResult<Json<ReviewModel>> {
    let product = product_by_name(&state, &name).await?;
    let mut values = validate_form(&CREATE_REVIEW, &form)?;
    let image_url = match form.image {
        Some(upload) => Some(store_image(&state, upload).await?),
        None => None,
    };

    let stored = image_url.clone();

    let created = state
        .store
        .create_review(NewReview {
            product_id: product.id,
            owner_id: user.id,
            rating: values.int("rating").unwrap_or_default(),
            text: values.str("text"),
            image_url,
        })
        .await;
    let review = release_on_error(&state, stored.as_deref(), created).await?;

    info!(review_id = review.id, product_id = product.id, "review created");
    Ok(Json(ReviewModel::new(state.links(), review)))
}
