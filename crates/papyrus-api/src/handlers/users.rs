//! Per-user LLM settings: API key and preferred model.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use papyrus_core::defaults::API_KEY_MAX_CHARS;
use papyrus_core::LlmSettings;

use crate::{ApiError, ApiJson, ApiResponse, AppState, CurrentUser};

/// Settings as returned to clients; the key itself is never echoed.
#[derive(Debug, Serialize)]
pub struct LlmSettingsView {
    pub has_api_key: bool,
    /// Last four characters of the stored key.
    pub api_key_hint: Option<String>,
    pub model_name: Option<String>,
}

impl From<&LlmSettings> for LlmSettingsView {
    fn from(settings: &LlmSettings) -> Self {
        let hint = settings.api_key().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("****{}", tail)
        });
        Self {
            has_api_key: hint.is_some(),
            api_key_hint: hint,
            model_name: settings.model_name().map(str::to_string),
        }
    }
}

async fn current_settings(state: &AppState, user_id: Uuid) -> Result<LlmSettings, ApiError> {
    Ok(state
        .repos
        .user_settings
        .get_llm_settings(user_id)
        .await?
        .unwrap_or_default())
}

async fn save(
    state: &AppState,
    user_id: Uuid,
    settings: LlmSettings,
) -> Result<Json<ApiResponse<LlmSettingsView>>, ApiError> {
    let view = LlmSettingsView::from(&settings);
    state
        .repos
        .user_settings
        .set_llm_settings(user_id, settings)
        .await?;
    Ok(ApiResponse::ok(view))
}

/// GET /api/v1/users/me/settings
pub async fn get_settings(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<LlmSettingsView>>, ApiError> {
    let settings = current_settings(&state, user_id).await?;
    Ok(ApiResponse::ok(LlmSettingsView::from(&settings)))
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyUpdate {
    pub api_key: String,
}

/// PUT /api/v1/users/me/api-key
pub async fn update_api_key(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(request): ApiJson<ApiKeyUpdate>,
) -> Result<Json<ApiResponse<LlmSettingsView>>, ApiError> {
    let api_key = request.api_key.trim();
    if api_key.is_empty() || api_key.chars().count() > API_KEY_MAX_CHARS {
        return Err(ApiError::BadRequest(format!(
            "api_key must be between 1 and {} characters",
            API_KEY_MAX_CHARS
        )));
    }

    let mut settings = current_settings(&state, user_id).await?;
    settings.api_key = Some(api_key.to_string());
    info!(subsystem = "api", user_id = %user_id, "User API key updated");
    save(&state, user_id, settings).await
}

/// DELETE /api/v1/users/me/api-key
///
/// Clears the key and keeps the preferred model.
pub async fn clear_api_key(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<LlmSettingsView>>, ApiError> {
    let mut settings = current_settings(&state, user_id).await?;
    settings.api_key = None;
    info!(subsystem = "api", user_id = %user_id, "User API key cleared");
    save(&state, user_id, settings).await
}

#[derive(Debug, Deserialize)]
pub struct PreferencesUpdate {
    /// `null` or blank resets to the server default model.
    pub model_name: Option<String>,
}

/// PUT /api/v1/users/me/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(request): ApiJson<PreferencesUpdate>,
) -> Result<Json<ApiResponse<LlmSettingsView>>, ApiError> {
    let mut settings = current_settings(&state, user_id).await?;
    settings.model_name = request
        .model_name
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    save(&state, user_id, settings).await
}
