use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// An external-auth identity resolved to its internal user record.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub external_id: String,
    pub display_name: String,
}

/// Map an external-auth identity to the internal user record.
///
/// A lookup miss is a first-class outcome (404 "user not found in
/// database"), distinct from an unauthenticated request; store failures
/// surface as infrastructure errors. Read-only, no side effects.
pub fn resolve(pool: &DbPool, external_id: &str) -> AppResult<AuthedUser> {
    let conn = pool.get()?;

    let user = conn
        .query_row(
            "SELECT id, external_id, display_name FROM users WHERE external_id = ?1",
            params![external_id],
            |row| {
                Ok(AuthedUser {
                    id: row.get(0)?,
                    external_id: row.get(1)?,
                    display_name: row.get(2)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound("user not found in database".into())
            }
            other => AppError::Database(other),
        })?;

    Ok(user)
}

/// Resolve an identity that may be absent. Anonymous requests and asserted
/// identities with no user row both come back as None (read endpoints only
/// annotate responses for resolvable callers); store failures still
/// propagate.
pub fn resolve_optional(pool: &DbPool, external_id: Option<&str>) -> AppResult<Option<AuthedUser>> {
    let Some(external_id) = external_id else {
        return Ok(None);
    };
    match resolve(pool, external_id) {
        Ok(user) => Ok(Some(user)),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
