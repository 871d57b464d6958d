use crate::error::{AppError, AppResult};

/// Ownership check applied before every delete/update of a post or
/// comment: the acting user must be the stored owner. No roles, no
/// admin override.
pub fn ensure_owner(owner_id: &str, actor_id: &str) -> AppResult<()> {
    if owner_id == actor_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
