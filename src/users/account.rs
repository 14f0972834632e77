//! Routes acting on the user identified by the bearer token, plus the
//! access-key flows that stand in for it when the password is unknown.

use axum::{
    extract::{FromRef, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{
    AccessKeyResponse, UserModel, ACCESS_KEY_REQUEST, CHANGE_EMAIL, CONFIRM_EMAIL,
    RESET_PASSWORD, USER_SETTINGS,
};
use crate::{
    auth::{password::hash_password, CurrentUser, JwtKeys, KeyPurpose},
    db::{Scope, User, UserSettings},
    error::{ApiError, ApiResult, FieldError},
    listing::{Collection, ListParams},
    orders::{dto::OrderModel, handlers::order_collection},
    reviews::{dto::ReviewModel, handlers::review_collection},
    state::AppState,
    validation::{validate_form, FormInput},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(get_current_user).put(update_current_user))
        .route("/user/email", put(change_email))
        .route("/user/reviews", get(list_own_reviews))
        .route("/user/orders", get(list_own_orders))
        .route("/user/access-key", post(issue_access_key))
        .route("/user/confirm-email", post(confirm_email))
        .route("/user/reset-password", post(reset_password))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_current_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<UserModel>> {
    Ok(Json(UserModel::new(state.links(), user)))
}

#[instrument(skip(state, user, form), fields(user_id = user.id))]
pub async fn update_current_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    form: FormInput,
) -> ApiResult<Json<UserModel>> {
    let mut values = validate_form(&USER_SETTINGS, &form)?;
    let settings = UserSettings {
        first_name: values.str("first_name").unwrap_or(user.first_name),
        last_name: values.str("last_name").unwrap_or(user.last_name),
        address: values.str("address").or(user.address),
    };
    let user = state.store.update_user_settings(user.id, settings).await?;
    info!(user_id = user.id, "user settings updated");
    Ok(Json(UserModel::new(state.links(), user)))
}

/// Moves the account to a new email; it must be confirmed again.
#[instrument(skip(state, user, form), fields(user_id = user.id))]
pub async fn change_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    form: FormInput,
) -> ApiResult<Json<UserModel>> {
    let mut values = validate_form(&CHANGE_EMAIL, &form)?;
    let email = values.str("email").unwrap_or_default();

    let Some(updated) = state.store.set_user_email(user.id, &email).await? else {
        warn!(%email, "email already registered");
        return Err(ApiError::Conflict(FieldError::new(
            "email",
            "value_error.already_exists",
            "user with this email already exists",
        )));
    };

    info!(user_id = updated.id, verified = updated.is_verified, "email changed");
    Ok(Json(UserModel::new(state.links(), updated)))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_own_reviews(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<ReviewModel>>> {
    review_collection(&state, Scope::Owner(user.id), &params).await
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_own_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Collection<OrderModel>>> {
    order_collection(&state, Scope::Owner(user.id), &params).await
}

/// Issues a key for the current user, or for the account named by the
/// `email` field when the token carries no user; delivering it is the
/// caller's job.
#[instrument(skip(state, current, form))]
pub async fn issue_access_key(
    State(state): State<AppState>,
    current: Result<CurrentUser, ApiError>,
    form: FormInput,
) -> ApiResult<Json<AccessKeyResponse>> {
    let mut values = validate_form(&ACCESS_KEY_REQUEST, &form)?;
    let purpose = values
        .str("purpose")
        .as_deref()
        .and_then(KeyPurpose::parse)
        .ok_or_else(|| {
            ApiError::Validation(vec![FieldError::new(
                "purpose",
                "type_error.enum",
                "value is not a valid enumeration member; permitted: 'confirm_email', 'reset_password'",
            )])
        })?;

    let user = match (current, values.str("email")) {
        (Ok(CurrentUser(user)), _) => user,
        (Err(ApiError::MissingUserData), Some(email)) => state
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(ApiError::NotFound("user"))?,
        (Err(e), _) => return Err(e),
    };

    let key = JwtKeys::from_ref(&state)
        .issue_access_key(&user.email, purpose)
        .map_err(ApiError::Internal)?;
    info!(user_id = user.id, ?purpose, "access key issued");
    Ok(Json(AccessKeyResponse {
        key,
        purpose,
        expires_in_minutes: state.config.auth.access_key_ttl_minutes,
    }))
}

#[instrument(skip(state, form))]
pub async fn confirm_email(
    State(state): State<AppState>,
    form: FormInput,
) -> ApiResult<Json<UserModel>> {
    let mut values = validate_form(&CONFIRM_EMAIL, &form)?;
    let key = values.str("key").unwrap_or_default();
    let user = redeem_key(&state, &key, KeyPurpose::ConfirmEmail).await?;

    state.store.set_user_verified(user.id).await?;
    info!(user_id = user.id, "email confirmed");
    Ok(Json(UserModel::new(
        state.links(),
        User {
            is_verified: true,
            ..user
        },
    )))
}

#[instrument(skip(state, form))]
pub async fn reset_password(
    State(state): State<AppState>,
    form: FormInput,
) -> ApiResult<Json<UserModel>> {
    let mut values = validate_form(&RESET_PASSWORD, &form)?;
    let key = values.str("key").unwrap_or_default();
    let user = redeem_key(&state, &key, KeyPurpose::ResetPassword).await?;

    let password_hash = hash_password(&values.str("password").unwrap_or_default())
        .map_err(ApiError::Internal)?;
    state.store.set_user_password(user.id, &password_hash).await?;
    info!(user_id = user.id, "password reset");
    Ok(Json(UserModel::new(state.links(), user)))
}

async fn redeem_key(state: &AppState, key: &str, purpose: KeyPurpose) -> ApiResult<User> {
    let email = JwtKeys::from_ref(state)
        .verify_access_key(key, purpose)
        .map_err(|e| {
            warn!(error = %e, ?purpose, "access key rejected");
            ApiError::Validation(vec![FieldError::new(
                "key",
                "value_error.access_key",
                "access key is invalid or expired",
            )])
        })?;
    state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(ApiError::NotFound("user"))
}
