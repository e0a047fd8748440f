//! Visibility rules for entries.
//!
//! Entries carry two flags: `private` (listed for everyone, openable only
//! by the owner or god) and `hidden` (invisible to everyone but the owner
//! or god, and indistinguishable from nonexistent). Every listing and the
//! detail/mutation checks go through this module so the policy cannot
//! drift between routes.

use sqlx::SqlitePool;

use crate::auth::Viewer;
use crate::error::AppError;
use crate::models::Entry;

/// Which listing a caller is asking for.
#[derive(Debug, Clone)]
pub enum ListScope {
    Global,
    ByAuthor(String),
    ByTag(String),
}

#[derive(Debug, Clone, Copy)]
pub enum MutationKind {
    Edit,
    Delete,
}

impl MutationKind {
    fn denied_message(self) -> &'static str {
        match self {
            MutationKind::Edit => "Cannot edit entry.",
            MutationKind::Delete => "Cannot delete entry.",
        }
    }
}

fn owner_or_privileged(entry: &Entry, viewer: &Viewer) -> bool {
    viewer.owns(entry) || viewer.is_privileged()
}

/// The one listing predicate shared by all scopes: hidden entries only
/// show up for their owner or god. Private-but-not-hidden entries are
/// listed (title and date) for everyone; whether they can be opened is
/// `check_view`'s business.
pub fn is_listable(entry: &Entry, viewer: &Viewer) -> bool {
    !entry.hidden || owner_or_privileged(entry, viewer)
}

/// Whether the viewer may open the entry's detail page. A hidden entry
/// must look nonexistent to unauthorized viewers, so that denial is
/// NotFound; a merely private entry may acknowledge its existence.
pub fn check_view(entry: &Entry, viewer: &Viewer) -> Result<(), AppError> {
    if owner_or_privileged(entry, viewer) {
        return Ok(());
    }
    if entry.hidden {
        return Err(AppError::NotFound("Entry does not exist."));
    }
    if entry.private {
        return Err(AppError::PrivateEntry);
    }
    Ok(())
}

/// Only the owner or god may edit or delete. The denial renders the same
/// as a nonexistent entry, so callers must produce the identical response
/// for a missing target.
pub fn authorize_mutation(
    entry: &Entry,
    viewer: &Viewer,
    kind: MutationKind,
) -> Result<(), AppError> {
    if owner_or_privileged(entry, viewer) {
        Ok(())
    } else {
        Err(AppError::Denied(kind.denied_message()))
    }
}

/// Resolve a listing for the viewer, date ascending.
///
/// `ByAuthor` fails with NotFound for an unknown username. `ByTag`
/// matches tag names case-insensitively and fails with NotFound both when
/// no variant of the tag exists and when every matching entry is hidden
/// from the viewer, so a probe cannot tell a hidden tag from a missing
/// one.
pub async fn resolve_listing(
    db: &SqlitePool,
    scope: ListScope,
    viewer: &Viewer,
) -> Result<Vec<Entry>, AppError> {
    let entries: Vec<Entry> = match &scope {
        ListScope::Global => {
            sqlx::query_as("SELECT * FROM entries ORDER BY date ASC, created_at ASC")
                .fetch_all(db)
                .await?
        }
        ListScope::ByAuthor(username) => {
            let author: Option<(String,)> =
                sqlx::query_as("SELECT id FROM users WHERE username = ?")
                    .bind(username)
                    .fetch_optional(db)
                    .await?;
            let Some((author_id,)) = author else {
                return Err(AppError::NotFound("User does not exist."));
            };
            sqlx::query_as(
                "SELECT * FROM entries WHERE user_id = ? ORDER BY date ASC, created_at ASC",
            )
            .bind(&author_id)
            .fetch_all(db)
            .await?
        }
        ListScope::ByTag(name) => {
            let variants: (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM tags WHERE name = ? COLLATE NOCASE")
                    .bind(name)
                    .fetch_one(db)
                    .await?;
            if variants.0 == 0 {
                return Err(AppError::NotFound("Tag not found."));
            }
            sqlx::query_as(
                r#"
                SELECT DISTINCT e.*
                FROM entries e
                JOIN entry_tags et ON et.entry_id = e.id
                JOIN tags t ON t.id = et.tag_id
                WHERE t.name = ? COLLATE NOCASE
                ORDER BY e.date ASC, e.created_at ASC
                "#,
            )
            .bind(name)
            .fetch_all(db)
            .await?
        }
    };

    let visible: Vec<Entry> = entries
        .into_iter()
        .filter(|e| is_listable(e, viewer))
        .collect();

    // An all-hidden tag match must be indistinguishable from a missing tag.
    if visible.is_empty() {
        if let ListScope::ByTag(_) = scope {
            return Err(AppError::NotFound("Tag not found."));
        }
    }

    Ok(visible)
}

/// Fetch a single entry for the viewer, applying the hidden/private rules.
pub async fn resolve_detail(
    db: &SqlitePool,
    entry_id: &str,
    viewer: &Viewer,
) -> Result<Entry, AppError> {
    let entry: Option<Entry> = sqlx::query_as("SELECT * FROM entries WHERE id = ?")
        .bind(entry_id)
        .fetch_optional(db)
        .await?;

    let Some(entry) = entry else {
        return Err(AppError::NotFound("Entry does not exist."));
    };

    check_view(&entry, viewer)?;
    Ok(entry)
}
