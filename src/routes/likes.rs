use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;

use crate::db::models::Like;
use crate::error::{AppError, AppResult};
use crate::extractors::ExternalIdentity;
use crate::identity;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    #[serde(alias = "postId")]
    pub post_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/likes", post(like_post).delete(unlike_post))
}

async fn like_post(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Json(req): Json<LikeRequest>,
) -> AppResult<Json<ApiResponse<Like>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let conn = state.db.get()?;
    ensure_post_exists(&conn, &req.post_id)?;

    // Idempotent upsert: a pre-existing like is a success, and two racing
    // likes both land on the same row.
    conn.execute(
        "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)
         ON CONFLICT(post_id, user_id) DO NOTHING",
        params![req.post_id, user.id],
    )?;

    let like = conn.query_row(
        "SELECT post_id, user_id, created_at FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![req.post_id, user.id],
        |row| {
            Ok(Like {
                post_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )?;

    Ok(ApiResponse::ok(like))
}

async fn unlike_post(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Json(req): Json<LikeRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let conn = state.db.get()?;
    ensure_post_exists(&conn, &req.post_id)?;

    // Unliking a never-liked post is a harmless no-op
    conn.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![req.post_id, user.id],
    )?;

    Ok(ApiResponse::empty())
}

fn ensure_post_exists(conn: &rusqlite::Connection, post_id: &str) -> AppResult<()> {
    conn.query_row(
        "SELECT id FROM posts WHERE id = ?1",
        params![post_id],
        |r| r.get::<_, String>(0),
    )
    .map_err(|_| AppError::NotFound("post not found".into()))?;
    Ok(())
}
