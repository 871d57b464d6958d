use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;

use crate::db::models::Follow;
use crate::error::{AppError, AppResult};
use crate::extractors::ExternalIdentity;
use crate::identity;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    #[serde(alias = "followingId")]
    pub following_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/follows", post(follow_user).delete(unfollow_user))
}

async fn follow_user(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Json(req): Json<FollowRequest>,
) -> AppResult<Json<ApiResponse<Follow>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    // Rejected before any store I/O
    if req.following_id == user.id {
        return Err(AppError::Validation("Cannot follow yourself".into()));
    }

    let conn = state.db.get()?;
    ensure_user_exists(&conn, &req.following_id)?;

    let already: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![user.id, req.following_id],
        |r| r.get(0),
    )?;
    if already {
        return Err(AppError::Validation("Already following this user".into()));
    }

    // A concurrent insert can slip past the pre-check; the primary key
    // catches it, and the loser sees the same duplicate error.
    conn.execute(
        "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
        params![user.id, req.following_id],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Validation("Already following this user".into())
        }
        other => AppError::Database(other),
    })?;

    let follow = conn.query_row(
        "SELECT follower_id, following_id, created_at FROM follows
         WHERE follower_id = ?1 AND following_id = ?2",
        params![user.id, req.following_id],
        |row| {
            Ok(Follow {
                follower_id: row.get(0)?,
                following_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )?;

    Ok(ApiResponse::ok(follow))
}

async fn unfollow_user(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Json(req): Json<FollowRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let conn = state.db.get()?;
    ensure_user_exists(&conn, &req.following_id)?;

    conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![user.id, req.following_id],
    )?;

    Ok(ApiResponse::empty())
}

fn ensure_user_exists(conn: &rusqlite::Connection, user_id: &str) -> AppResult<()> {
    conn.query_row(
        "SELECT id FROM users WHERE id = ?1",
        params![user_id],
        |r| r.get::<_, String>(0),
    )
    .map_err(|_| AppError::NotFound("user not found".into()))?;
    Ok(())
}
