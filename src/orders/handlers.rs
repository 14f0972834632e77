use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{OrderModel, CREATE_ORDER};
use crate::{
    auth::CurrentUser,
    db::{AcceptOutcome, NewOrder, Scope},
    error::{ApiError, ApiResult, FieldError},
    listing::{Collection, ListParams, OrderSort},
    products::services::product_by_name,
    state::AppState,
    validation::{validate_form, FormInput, IdPath},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products/:name/orders",
            get(list_product_orders).post(create_order),
        )
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
}

/// Shared by every order collection route.
pub async fn order_collection(
    state: &AppState,
    scope: Scope,
    params: &ListParams,
) -> ApiResult<Json<Collection<OrderModel>>> {
    let listing = params.listing::<OrderSort>()?;
    let page = state.store.list_orders(scope, &listing).await?;
    let links = state.links();
    Ok(Json(page.map(|o| OrderModel::new(links, o)).into()))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<OrderModel>>> {
    order_collection(&state, Scope::All, &params).await
}

#[instrument(skip(state))]
pub async fn list_product_orders(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<OrderModel>>> {
    let product = product_by_name(&state, &name).await?;
    order_collection(&state, Scope::Product(product.id), &params).await
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<OrderModel>> {
    let order = state
        .store
        .find_order(id)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    Ok(Json(OrderModel::new(state.links(), order)))
}

#[instrument(skip(state, user, form), fields(user_id = user.id))]
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    form: FormInput,
) -> ApiResult<Json<OrderModel>> {
    let product = product_by_name(&state, &name).await?;
    let mut values = validate_form(&CREATE_ORDER, &form)?;
    let address = values
        .str("address")
        .or(user.address)
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| {
            ApiError::Validation(vec![FieldError::new(
                "address",
                "value_error.missing",
                "field required",
            )])
        })?;

    let order = state
        .store
        .create_order(NewOrder {
            product_id: product.id,
            owner_id: user.id,
            address,
            wishes: values.str("wishes"),
        })
        .await?;

    info!(order_id = order.id, product_id = product.id, "order created");
    Ok(Json(OrderModel::new(state.links(), order)))
}

/// Payment confirmation: `created` → `accepted`, counting the sale once.
#[instrument(skip(state))]
pub async fn accept_order(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<OrderModel>> {
    match state.store.accept_order(id).await? {
        AcceptOutcome::Accepted(order) => {
            info!(order_id = id, product_id = order.product_id, "order accepted");
            Ok(Json(OrderModel::new(state.links(), order)))
        }
        AcceptOutcome::AlreadyAccepted => {
            warn!(order_id = id, "order already accepted");
            Err(ApiError::Conflict(FieldError::new(
                "order",
                "value_error.already_accepted",
                "order has already been accepted",
            )))
        }
        AcceptOutcome::Missing => Err(ApiError::NotFound("order")),
    }
}
