//! Quota-checked uploads tracked in the `uploads` table.

use crate::db::models::User;
use crate::db::uploads;
use crate::error::{AppError, AppResult};
use crate::plans;
use crate::state::AppState;
use crate::storage::Upload;

/// Store an upload on behalf of `owner` and record it against their quota.
pub async fn store(state: &AppState, owner: &User, dir: &str, upload: &Upload) -> AppResult<String> {
    let (plan, used) = {
        let conn = state.db.get()?;
        (plans::plan_for(&conn, owner)?, uploads::used_bytes(&conn, &owner.id)?)
    };
    if used + upload.size() > plan.storage_bytes() {
        return Err(AppError::forbidden(format!(
            "Your {} plan includes {} MB of storage. Upgrade to upload more.",
            plan.name, plan.limits.storage_mb
        )));
    }

    let path = state
        .storage
        .put(dir, &upload.extension(), upload.data.clone())
        .await?;

    let recorded = state.db.get().map_err(AppError::from).and_then(|conn| {
        uploads::record(&conn, &path, &owner.id, &upload.content_type, upload.size())
            .map_err(AppError::from)
    });
    if let Err(e) = recorded {
        if let Err(cleanup) = state.storage.delete(&path).await {
            tracing::warn!("Failed to remove orphaned upload {}: {}", path, cleanup);
        }
        return Err(e);
    }

    Ok(path)
}

/// Delete a stored blob and its quota row. Failures are logged, never returned:
/// the owning row has already moved on.
pub async fn remove(state: &AppState, path: &str) {
    if let Err(e) = state.storage.delete(path).await {
        tracing::warn!("Failed to delete blob {}: {}", path, e);
    }
    match state.db.get() {
        Ok(conn) => {
            if let Err(e) = uploads::forget(&conn, path) {
                tracing::warn!("Failed to forget upload {}: {}", path, e);
            }
        }
        Err(e) => tracing::warn!("Failed to forget upload {}: {}", path, e),
    }
}

pub async fn remove_all(state: &AppState, paths: &[String]) {
    for path in paths {
        remove(state, path).await;
    }
}

/// Store the replacement, point the row at it, then drop the previous blob.
pub async fn replace<F>(
    state: &AppState,
    owner: &User,
    dir: &str,
    upload: &Upload,
    previous: Option<&str>,
    update_row: F,
) -> AppResult<String>
where
    F: FnOnce(&rusqlite::Connection, &str) -> rusqlite::Result<()>,
{
    let path = store(state, owner, dir, upload).await?;

    let updated = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| update_row(&conn, &path).map_err(AppError::from));
    if let Err(e) = updated {
        remove(state, &path).await;
        return Err(e);
    }

    if let Some(old) = previous.filter(|old| *old != path) {
        remove(state, old).await;
    }
    Ok(path)
}
