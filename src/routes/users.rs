use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::extractors::{ExternalIdentity, MaybeIdentity};
use crate::identity;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Profile response: user plus store-computed aggregates.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub created_at: String,
    pub post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(my_profile))
        .route("/users/{id}", get(user_profile))
}

async fn user_profile(
    State(state): State<AppState>,
    MaybeIdentity(external_id): MaybeIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let viewer = identity::resolve_optional(&state.db, external_id.as_deref())?;

    let conn = state.db.get()?;
    let profile = query_profile(&conn, &id, viewer.as_ref().map(|u| u.id.as_str()))?;

    Ok(ApiResponse::ok(profile))
}

async fn my_profile(
    State(state): State<AppState>,
    ExternalIdentity(external_id): ExternalIdentity,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let user = identity::resolve(&state.db, &external_id)?;

    let conn = state.db.get()?;
    let profile = query_profile(&conn, &user.id, None)?;

    Ok(ApiResponse::ok(profile))
}

fn query_profile(
    conn: &rusqlite::Connection,
    user_id: &str,
    viewer_id: Option<&str>,
) -> Result<UserProfile, AppError> {
    let uid = viewer_id.unwrap_or("");

    conn.query_row(
        "SELECT u.id, u.display_name, u.created_at,
                (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id) AS post_count,
                (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS follower_count,
                (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count,
                (SELECT COUNT(*) > 0 FROM follows f
                 WHERE f.follower_id = ?2 AND f.following_id = u.id) AS is_following
         FROM users u
         WHERE u.id = ?1",
        params![user_id, uid],
        |row| {
            Ok(UserProfile {
                id: row.get(0)?,
                display_name: row.get(1)?,
                created_at: row.get(2)?,
                post_count: row.get(3)?,
                follower_count: row.get(4)?,
                following_count: row.get(5)?,
                is_following: row.get(6)?,
            })
        },
    )
    .map_err(|_| AppError::NotFound("user not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::state::DbPool;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn seeded_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, external_id, display_name) VALUES ('u1', 'ext-1', 'alice');
             INSERT INTO users (id, external_id, display_name) VALUES ('u2', 'ext-2', 'bob');
             INSERT INTO users (id, external_id, display_name) VALUES ('u3', 'ext-3', 'carol');
             INSERT INTO posts (id, user_id, image_path, image_url) VALUES ('p1', 'u1', 'a/1.jpg', '/media/a/1.jpg');
             INSERT INTO posts (id, user_id, image_path, image_url) VALUES ('p2', 'u1', 'a/2.jpg', '/media/a/2.jpg');
             INSERT INTO follows (follower_id, following_id) VALUES ('u2', 'u1');
             INSERT INTO follows (follower_id, following_id) VALUES ('u3', 'u1');
             INSERT INTO follows (follower_id, following_id) VALUES ('u1', 'u2');",
        )
        .unwrap();
        pool
    }

    #[test]
    fn profile_aggregates_counts() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        let profile = query_profile(&conn, "u1", None).unwrap();
        assert_eq!(profile.display_name, "alice");
        assert_eq!(profile.post_count, 2);
        assert_eq!(profile.follower_count, 2);
        assert_eq!(profile.following_count, 1);
        assert!(!profile.is_following);
    }

    #[test]
    fn is_following_reflects_viewer() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        let as_follower = query_profile(&conn, "u1", Some("u2")).unwrap();
        assert!(as_follower.is_following);

        let as_stranger = query_profile(&conn, "u2", Some("u3")).unwrap();
        assert!(!as_stranger.is_following);
    }

    #[test]
    fn missing_user_is_not_found() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        let err = query_profile(&conn, "nobody", None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
