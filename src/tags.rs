//! Tag reconciliation.
//!
//! The `entry_tags` table is the source of truth for which tags an entry
//! carries; tag rows exist only while at least one association references
//! them. `reconcile` diffs an entry's previous and submitted tag strings
//! and applies the minimal set of association changes, creating tag rows
//! on first use and deleting them when their last association goes away.
//!
//! Tag identity is exact-string (case-sensitive): "go" and "Go" are
//! distinct tags. Case-insensitive matching exists only in tag search
//! (see `visibility::resolve_listing`).

use sqlx::SqliteConnection;

use crate::error::AppError;
use crate::models::Tag;

/// Split a comma-separated tag string into trimmed, non-empty names.
/// An empty string yields an empty list.
pub fn listify(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bring the entry's tag associations in line with `new_tags`.
///
/// Runs on a plain connection so callers can wrap it in the same
/// transaction as the entry write. Reconciling identical tag strings
/// issues no writes; deleting an entry is `reconcile(.., tags, "")`
/// followed by the entry's own DELETE.
pub async fn reconcile(
    conn: &mut SqliteConnection,
    entry_id: &str,
    old_tags: &str,
    new_tags: &str,
) -> Result<(), AppError> {
    let old = listify(old_tags);
    let new = listify(new_tags);

    for name in old.iter().filter(|t| !new.contains(t)) {
        remove_association(conn, entry_id, name).await?;
    }

    for name in new.iter().filter(|t| !old.contains(t)) {
        let tag_id = find_or_create_tag(conn, name).await?;
        sqlx::query("INSERT OR IGNORE INTO entry_tags (entry_id, tag_id) VALUES (?, ?)")
            .bind(entry_id)
            .bind(&tag_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Drop the (entry, tag) association and garbage-collect the tag row if
/// nothing references it anymore. A tag name with no row is skipped; the
/// associations are authoritative, so there is nothing to remove.
async fn remove_association(
    conn: &mut SqliteConnection,
    entry_id: &str,
    name: &str,
) -> Result<(), AppError> {
    let tag: Option<(String,)> = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    let Some((tag_id,)) = tag else {
        return Ok(());
    };

    sqlx::query("DELETE FROM entry_tags WHERE entry_id = ? AND tag_id = ?")
        .bind(entry_id)
        .bind(&tag_id)
        .execute(&mut *conn)
        .await?;

    let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entry_tags WHERE tag_id = ?")
        .bind(&tag_id)
        .fetch_one(&mut *conn)
        .await?;
    if remaining.0 == 0 {
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(&tag_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Find a tag by exact name, creating it if absent. Losing a creation
/// race to a concurrent request surfaces as a unique violation; the
/// winner's row is fetched instead. A second miss is a storage error.
async fn find_or_create_tag(conn: &mut SqliteConnection, name: &str) -> Result<String, AppError> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let tag = Tag::new(name);
    let inserted = sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&tag.id)
        .bind(&tag.name)
        .bind(&tag.created_at)
        .execute(&mut *conn)
        .await;

    match inserted {
        Ok(_) => Ok(tag.id),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let winner: Option<(String,)> = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?;
            winner
                .map(|(id,)| id)
                .ok_or(AppError::Database(sqlx::Error::RowNotFound))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listify_splits_and_trims() {
        assert_eq!(listify("go, Go , backend"), vec!["go", "Go", "backend"]);
    }

    #[test]
    fn listify_drops_empty_members() {
        assert_eq!(listify("a, ,b,,"), vec!["a", "b"]);
    }

    #[test]
    fn listify_empty_string_is_empty_list() {
        assert!(listify("").is_empty());
        assert!(listify("  ").is_empty());
        assert!(listify(",").is_empty());
    }

    #[test]
    fn listify_is_case_preserving() {
        assert_eq!(listify("Rust"), vec!["Rust"]);
    }
}
