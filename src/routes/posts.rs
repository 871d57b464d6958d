use axum::extract::{Multipart, Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::{ExternalIdentity, MaybeIdentity};
use crate::guard;
use crate::identity;
use crate::routes::ApiResponse;
use crate::state::AppState;

pub const CAPTION_MAX_CHARS: usize = 2200;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const RECENT_COMMENT_COUNT: i64 = 2;

// --- View structs ---

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub content: String,
    pub created_at: String,
}

/// A feed entry: post enriched with author, counts, and the two most
/// recent comments.
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub created_at: String,
    pub like_count: i64,
    pub comment_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_by_me: Option<bool>,
    pub recent_comments: Vec<CommentView>,
}

/// Single-post detail: same enrichment, plus the full comment list.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub created_at: String,
    pub like_count: i64,
    pub comment_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_by_me: Option<bool>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(feed).post(create_post))
        .route("/posts/{id}", get(post_detail).delete(delete_post))
}

// --- Handlers ---

async fn feed(
    State(state): State<AppState>,
    MaybeIdentity(external_id): MaybeIdentity,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<ApiResponse<Vec<PostView>>>> {
    let viewer = identity::resolve_optional(&state.db, external_id.as_deref())?;
    let (limit, offset) = page_params(&query);

    let conn = state.db.get()?;
    let posts = query_feed_page(
        &conn,
        viewer.as_ref().map(|u| u.id.as_str()),
        query.user_id.as_deref(),
        limit,
        offset,
    )?;

    Ok(ApiResponse::ok(posts))
}

async fn post_detail(
    State(state): State<AppState>,
    MaybeIdentity(external_id): MaybeIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<PostDetail>>> {
    let viewer = identity::resolve_optional(&state.db, external_id.as_deref())?;

    let conn = state.db.get()?;
    let detail = query_post_detail(&conn, &id, viewer.as_ref().map(|u| u.id.as_str()))?;

    Ok(ApiResponse::ok(detail))
}

async fn create_post(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Post>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let mut image: Option<(String, Vec<u8>)> = None;
    let mut caption: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .ok_or_else(|| AppError::Validation("Image field has no content type".into()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read image: {}", e)))?;
                image = Some((content_type, data.to_vec()));
            }
            Some("caption") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read caption: {}", e)))?;
                caption = Some(text);
            }
            _ => {}
        }
    }

    // Validate everything before touching the file store: a rejected
    // caption must not leave an uploaded file behind.
    let caption = validate_caption(caption)?;
    let (content_type, data) =
        image.ok_or_else(|| AppError::Validation("Image file is required".into()))?;

    let stored = state.files.store(&external_id, &content_type, &data)?;

    let post_id = uuid::Uuid::now_v7().to_string();
    if let Err(e) = insert_post_row(&state, &post_id, &user.id, &stored.path, &stored.url, caption.as_deref()) {
        // Compensating action: the row write failed after the upload
        // succeeded. Cleanup is best-effort; an orphaned file is an
        // accepted risk.
        state.files.remove(&stored.path);
        return Err(e);
    }

    let conn = state.db.get()?;
    let post = fetch_post_record(&conn, &post_id)?;
    Ok(ApiResponse::ok(post))
}

async fn delete_post(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let conn = state.db.get()?;
    let (owner_id, image_path): (String, String) = conn
        .query_row(
            "SELECT user_id, image_path FROM posts WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|_| AppError::NotFound("post not found".into()))?;

    guard::ensure_owner(&owner_id, &user.id)?;

    // File first, best-effort: a failed file delete never blocks the
    // record delete. Likes and comments cascade at the store.
    state.files.remove(&image_path);
    conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;

    Ok(ApiResponse::empty())
}

// --- Validation helpers ---

fn page_params(query: &FeedQuery) -> (i64, i64) {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    (limit, offset)
}

fn validate_caption(caption: Option<String>) -> AppResult<Option<String>> {
    match caption {
        None => Ok(None),
        Some(text) => {
            if text.chars().count() > CAPTION_MAX_CHARS {
                return Err(AppError::Validation(format!(
                    "Caption must be {} characters or less",
                    CAPTION_MAX_CHARS
                )));
            }
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(text))
            }
        }
    }
}

fn insert_post_row(
    state: &AppState,
    post_id: &str,
    user_id: &str,
    image_path: &str,
    image_url: &str,
    caption: Option<&str>,
) -> AppResult<()> {
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO posts (id, user_id, image_path, image_url, caption) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post_id, user_id, image_path, image_url, caption],
    )?;
    Ok(())
}

pub(crate) fn fetch_post_record(conn: &rusqlite::Connection, id: &str) -> AppResult<Post> {
    conn.query_row(
        "SELECT id, user_id, image_path, image_url, caption, created_at, updated_at
         FROM posts WHERE id = ?1",
        params![id],
        |row| {
            Ok(Post {
                id: row.get(0)?,
                user_id: row.get(1)?,
                image_path: row.get(2)?,
                image_url: row.get(3)?,
                caption: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .map_err(|_| AppError::NotFound("post not found".into()))
}

// --- Read assemblers ---

/// One page of the feed, newest first. Each post fans out a secondary
/// read for its recent comments (accepted N+1 at these data volumes).
fn query_feed_page(
    conn: &rusqlite::Connection,
    viewer_id: Option<&str>,
    user_filter: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostView>, AppError> {
    let uid = viewer_id.unwrap_or("");
    let filter = user_filter.unwrap_or("");

    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, u.display_name, p.image_url, p.caption, p.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
                (SELECT COUNT(*) > 0 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?3) AS liked
         FROM posts p
         JOIN users u ON u.id = p.user_id
         WHERE (?4 = '' OR p.user_id = ?4)
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?1 OFFSET ?2",
    )?;

    let rows: Vec<(String, String, String, String, Option<String>, String, i64, i64, bool)> = stmt
        .query_map(params![limit, offset, uid, filter], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .collect();

    let mut posts = Vec::with_capacity(rows.len());
    for (id, user_id, display_name, image_url, caption, created_at, like_count, comment_count, liked) in rows {
        let recent_comments = query_recent_comments(conn, &id, RECENT_COMMENT_COUNT)?;
        posts.push(PostView {
            id,
            user_id,
            display_name,
            image_url,
            caption,
            created_at,
            like_count,
            comment_count,
            liked_by_me: viewer_id.map(|_| liked),
            recent_comments,
        });
    }

    Ok(posts)
}

fn query_post_detail(
    conn: &rusqlite::Connection,
    post_id: &str,
    viewer_id: Option<&str>,
) -> Result<PostDetail, AppError> {
    let uid = viewer_id.unwrap_or("");

    let row = conn
        .query_row(
            "SELECT p.id, p.user_id, u.display_name, p.image_url, p.caption, p.created_at,
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
                    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
                    (SELECT COUNT(*) > 0 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?2) AS liked
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.id = ?1",
            params![post_id, uid],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, bool>(8)?,
                ))
            },
        )
        .map_err(|_| AppError::NotFound("post not found".into()))?;

    let comments = query_all_comments(conn, post_id)?;

    let (id, user_id, display_name, image_url, caption, created_at, like_count, comment_count, liked) = row;
    Ok(PostDetail {
        id,
        user_id,
        display_name,
        image_url,
        caption,
        created_at,
        like_count,
        comment_count,
        liked_by_me: viewer_id.map(|_| liked),
        comments,
    })
}

/// The N most recent comments, returned in chronological order.
fn query_recent_comments(
    conn: &rusqlite::Connection,
    post_id: &str,
    limit: i64,
) -> Result<Vec<CommentView>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.user_id, u.display_name, c.content, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at DESC, c.rowid DESC
         LIMIT ?2",
    )?;

    let mut comments: Vec<CommentView> = stmt
        .query_map(params![post_id, limit], map_comment_row)?
        .filter_map(|r| r.ok())
        .collect();

    comments.reverse();
    Ok(comments)
}

/// Full, unbounded comment list for the detail view, oldest first.
fn query_all_comments(
    conn: &rusqlite::Connection,
    post_id: &str,
) -> Result<Vec<CommentView>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.user_id, u.display_name, c.content, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC",
    )?;

    let comments = stmt
        .query_map(params![post_id], map_comment_row)?
        .filter_map(|r| r.ok())
        .collect();

    Ok(comments)
}

fn map_comment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        id: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// --- Tests ---
