use axum::{extract::State, response::IntoResponse, Json};
use crate::api::extractors::admin::AdminUser;
use crate::domain::models::settings::AdminSettings;
use crate::domain::services::blocking::SUNDAY_BLOCK_DAYS;
use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.settings.get().await?))
}

pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<AdminSettings>,
) -> Result<impl IntoResponse, AppError> {
    let saved = state.settings.save(payload).await?;

    if saved.auto_block_sundays {
        let today = state.config.local_now().date();
        state.blocking.block_sundays(today, SUNDAY_BLOCK_DAYS).await?;
    }

    Ok(Json(saved))
}
