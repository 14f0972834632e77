use crate::db::Product;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Resolves the `{name}` path segment shared by every product route.
pub async fn product_by_name(st: &AppState, name: &str) -> ApiResult<Product> {
    st.store
        .find_product(name)
        .await?
        .ok_or(ApiError::NotFound("product"))
}
