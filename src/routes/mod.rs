pub mod comments;
pub mod follows;
pub mod likes;
pub mod media;
pub mod posts;
pub mod users;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppResult;
use crate::state::AppState;

/// Uniform response envelope: `{ success, data?, error? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    /// Empty success body for deletes and no-op mutations.
    pub fn empty() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(posts::router())
        .merge(comments::router())
        .merge(likes::router())
        .merge(follows::router())
        .merge(users::router())
        .merge(media::router());

    // Test-only seed endpoint: provisions a user row for an external id.
    // User provisioning is otherwise owned by the auth provider's webhook.
    if std::env::var("PICTOR_TEST_SEED").is_ok() {
        router = router.route("/test/seed", post(test_seed));
    }

    let body_limit = state.config.storage.max_upload_bytes as usize + 64 * 1024;

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct SeedRequest {
    external_id: String,
    display_name: String,
}

async fn test_seed(
    State(state): State<AppState>,
    Json(req): Json<SeedRequest>,
) -> AppResult<Json<ApiResponse<crate::db::models::User>>> {
    let conn = state.db.get()?;
    let user_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT OR IGNORE INTO users (id, external_id, display_name) VALUES (?1, ?2, ?3)",
        params![user_id, req.external_id, req.display_name],
    )?;

    // The row may predate this call; return whatever is stored
    let user = conn.query_row(
        "SELECT id, external_id, display_name, created_at FROM users WHERE external_id = ?1",
        params![req.external_id],
        |row| {
            Ok(crate::db::models::User {
                id: row.get(0)?,
                external_id: row.get(1)?,
                display_name: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )?;

    Ok(ApiResponse::ok(user))
}
