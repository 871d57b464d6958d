use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;

use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::ExternalIdentity;
use crate::guard;
use crate::identity;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(alias = "postId")]
    pub post_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    #[serde(alias = "commentId")]
    pub comment_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/comments", post(create_comment).delete(delete_comment))
}

async fn create_comment(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".into()));
    }

    let comment_id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;

    // Verify post exists
    let _: String = conn
        .query_row(
            "SELECT id FROM posts WHERE id = ?1",
            params![req.post_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound("post not found".into()))?;

    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![comment_id, req.post_id, user.id, content],
    )?;

    let comment = conn.query_row(
        "SELECT id, post_id, user_id, content, created_at, updated_at FROM comments WHERE id = ?1",
        params![comment_id],
        |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                user_id: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )?;

    Ok(ApiResponse::ok(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Json(req): Json<DeleteCommentRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let conn = state.db.get()?;
    let owner_id: String = conn
        .query_row(
            "SELECT user_id FROM comments WHERE id = ?1",
            params![req.comment_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound("comment not found".into()))?;

    guard::ensure_owner(&owner_id, &user.id)?;

    conn.execute("DELETE FROM comments WHERE id = ?1", params![req.comment_id])?;
    Ok(ApiResponse::empty())
}
