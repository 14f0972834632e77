use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{UserModel, REGISTER_USER};
use crate::{
    auth::password::hash_password,
    db::{NewUser, Scope, User},
    error::{ApiError, ApiResult, FieldError},
    listing::{Collection, ListParams, UserSort},
    orders::{dto::OrderModel, handlers::order_collection},
    reviews::{dto::ReviewModel, handlers::review_collection},
    state::AppState,
    validation::{validate_form, FormInput, IdPath},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/reviews", get(list_user_reviews))
        .route("/users/:id/orders", get(list_user_orders))
}

async fn user_by_id(state: &AppState, id: i64) -> ApiResult<User> {
    state
        .store
        .find_user(id)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<UserModel>>> {
    let listing = params.listing::<UserSort>()?;
    let filter = params.user_filter()?;
    let page = state.store.list_users(filter, &listing).await?;
    let links = state.links();
    Ok(Json(page.map(|u| UserModel::new(links, u)).into()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<UserModel>> {
    let user = user_by_id(&state, id).await?;
    Ok(Json(UserModel::new(state.links(), user)))
}

#[instrument(skip(state))]
pub async fn list_user_reviews(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<ReviewModel>>> {
    let user = user_by_id(&state, id).await?;
    review_collection(&state, Scope::Owner(user.id), &params).await
}

#[instrument(skip(state))]
pub async fn list_user_orders(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<OrderModel>>> {
    let user = user_by_id(&state, id).await?;
    order_collection(&state, Scope::Owner(user.id), &params).await
}

#[instrument(skip(state, form))]
pub async fn register_user(
    State(state): State<AppState>,
    form: FormInput,
) -> ApiResult<Json<UserModel>> {
    let mut values = validate_form(&REGISTER_USER, &form)?;
    let email = values.str("email").unwrap_or_default();
    let password_hash = hash_password(&values.str("password").unwrap_or_default())
        .map_err(ApiError::Internal)?;

    let created = state
        .store
        .create_user(NewUser {
            email: email.clone(),
            password_hash,
            first_name: values.str("first_name").unwrap_or_default(),
            last_name: values.str("last_name").unwrap_or_default(),
            address: values.str("address"),
        })
        .await?;

    let Some(user) = created else {
        warn!(%email, "email already registered");
        return Err(ApiError::Conflict(FieldError::new(
            "email",
            "value_error.already_exists",
            "user with this email already exists",
        )));
    };

    info!(user_id = user.id, "user registered");
    Ok(Json(UserModel::new(state.links(), user)))
}
