use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::auth::{AuthUser, SessionUser, Viewer};
use crate::error::AppError;
use crate::models::{normalize_visibility, Entry};
use crate::tags::{listify, reconcile};
use crate::visibility::{
    authorize_mutation, check_view, resolve_detail, resolve_listing, ListScope, MutationKind,
};
use crate::AppState;

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingTemplate {
    heading: String,
    entries: Vec<EntryRow>,
    user: Option<SessionUser>,
    static_hash: &'static str,
}

/// One listing line: title and date always, a link only when the viewer
/// may open the entry, edit affordances only for the owner (or god).
struct EntryRow {
    id: String,
    title: String,
    date: String,
    author: String,
    openable: bool,
    owned: bool,
}

#[derive(Template)]
#[template(path = "entries/detail.html")]
struct EntryDetailTemplate {
    entry: Entry,
    author_name: String,
    tags: Vec<TagLink>,
    can_edit: bool,
    user: Option<SessionUser>,
    static_hash: &'static str,
}

struct TagLink {
    name: String,
    href: String,
}

#[derive(Template)]
#[template(path = "entries/form.html")]
struct EntryFormTemplate {
    action: String,
    button: &'static str,
    title: String,
    date: String,
    time_spent: i64,
    learned: String,
    resources: String,
    tags: String,
    private: bool,
    hidden: bool,
    errors: Vec<String>,
    user: Option<SessionUser>,
    static_hash: &'static str,
}

#[derive(Deserialize)]
pub struct EntryForm {
    title: String,
    date: String,
    time_spent: i64,
    learned: String,
    resources: String,
    tags: Option<String>,
    private: Option<String>,
    hidden: Option<String>,
}

impl EntryForm {
    fn tags_string(&self) -> String {
        self.tags.clone().unwrap_or_default()
    }

    /// Checkbox pair normalized so hidden always implies private.
    fn flags(&self) -> (bool, bool) {
        normalize_visibility(self.private.is_some(), self.hidden.is_some())
    }
}

fn validate_entry_form(form: &EntryForm) -> Vec<String> {
    let mut errors = Vec::new();

    if form.title.trim().is_empty() {
        errors.push("Title is required.".to_string());
    }
    if form.title.len() > 256 {
        errors.push("Title must be under 256 characters.".to_string());
    }
    if chrono::NaiveDate::parse_from_str(&form.date, "%Y-%m-%d").is_err() {
        errors.push("Date must be a valid YYYY-MM-DD date.".to_string());
    }
    if form.time_spent < 1 {
        errors.push("Time spent must be at least 1 minute.".to_string());
    }
    if form.learned.trim().is_empty() {
        errors.push("What you learned is required.".to_string());
    }
    if form.resources.trim().is_empty() {
        errors.push("Resources to remember is required.".to_string());
    }

    errors
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/entries", get(entries_redirect).post(create_entry))
        .route("/entries/new", get(new_entry_form))
        .route("/entries/{id}", get(show_entry))
        .route("/entries/{id}/edit", get(edit_entry_form).post(update_entry))
        .route("/entries/{id}/delete", post(delete_entry))
        .route("/users/{username}", get(author_entries))
}

async fn username_map(db: &SqlitePool) -> Result<HashMap<String, String>, AppError> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, username FROM users")
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Shared rendering for all three listing scopes, so every listing runs
/// through the same visibility filter.
pub(crate) async fn render_listing(
    db: &SqlitePool,
    scope: ListScope,
    viewer: &Viewer,
    heading: String,
) -> Result<Html<String>, AppError> {
    let entries = resolve_listing(db, scope, viewer).await?;
    let authors = username_map(db).await?;

    let rows: Vec<EntryRow> = entries
        .into_iter()
        .map(|entry| {
            let openable = check_view(&entry, viewer).is_ok();
            let owned = viewer.owns(&entry) || viewer.is_privileged();
            let author = authors
                .get(&entry.user_id)
                .cloned()
                .unwrap_or_default();
            EntryRow {
                id: entry.id,
                title: entry.title,
                date: entry.date,
                author,
                openable,
                owned,
            }
        })
        .collect();

    let template = ListingTemplate {
        heading,
        entries: rows,
        user: viewer.user().cloned(),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?))
}

async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<impl IntoResponse, AppError> {
    render_listing(&state.db, ListScope::Global, &viewer, "All entries".to_string()).await
}

async fn entries_redirect() -> Redirect {
    Redirect::to("/")
}

async fn author_entries(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let heading = match viewer.user() {
        Some(u) if u.username == username => "Your entries".to_string(),
        _ => format!("Entries by {username}"),
    };
    render_listing(&state.db, ListScope::ByAuthor(username), &viewer, heading).await
}

async fn show_entry(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = resolve_detail(&state.db, &id, &viewer).await?;

    let author_name: (String,) = sqlx::query_as("SELECT username FROM users WHERE id = ?")
        .bind(&entry.user_id)
        .fetch_one(&state.db)
        .await?;

    let tags: Vec<TagLink> = listify(&entry.tags)
        .into_iter()
        .map(|name| {
            // Path segment, not a form value: spaces must be %20, not +.
            let href: String = url::form_urlencoded::byte_serialize(name.as_bytes())
                .collect::<String>()
                .replace('+', "%20");
            TagLink { name, href }
        })
        .collect();

    let can_edit = viewer.owns(&entry) || viewer.is_privileged();

    let template = EntryDetailTemplate {
        entry,
        author_name: author_name.0,
        tags,
        can_edit,
        user: viewer.user().cloned(),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?))
}

async fn new_entry_form(AuthUser(user): AuthUser) -> Result<impl IntoResponse, AppError> {
    let template = EntryFormTemplate {
        action: "/entries".to_string(),
        button: "Create",
        title: String::new(),
        date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        time_spent: 30,
        learned: String::new(),
        resources: String::new(),
        tags: String::new(),
        private: false,
        hidden: false,
        errors: Vec::new(),
        user: Some(user),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?))
}

fn form_with_errors(
    action: String,
    button: &'static str,
    form: &EntryForm,
    errors: Vec<String>,
    user: SessionUser,
) -> Result<Response, AppError> {
    let (private, hidden) = form.flags();
    let template = EntryFormTemplate {
        action,
        button,
        title: form.title.clone(),
        date: form.date.clone(),
        time_spent: form.time_spent,
        learned: form.learned.clone(),
        resources: form.resources.clone(),
        tags: form.tags_string(),
        private,
        hidden,
        errors,
        user: Some(user),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?).into_response())
}

async fn create_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Form(form): Form<EntryForm>,
) -> Result<impl IntoResponse, AppError> {
    let errors = validate_entry_form(&form);
    if !errors.is_empty() {
        return form_with_errors("/entries".to_string(), "Create", &form, errors, user);
    }

    let (private, hidden) = form.flags();
    let tags = form.tags_string();
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    // Entry row and its tag associations land together or not at all.
    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO entries (id, user_id, title, date, time_spent, learned, resources, tags, private, hidden, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&form.title)
    .bind(&form.date)
    .bind(form.time_spent)
    .bind(&form.learned)
    .bind(&form.resources)
    .bind(&tags)
    .bind(private)
    .bind(hidden)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    reconcile(&mut tx, &id, "", &tags).await?;
    tx.commit().await?;

    Ok(Redirect::to(&format!("/users/{}", user.username)).into_response())
}

async fn edit_entry_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::User(user.clone());

    let entry: Option<Entry> = sqlx::query_as("SELECT * FROM entries WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    // Same response for a missing entry and a foreign one.
    let Some(entry) = entry else {
        return Err(AppError::Denied("Cannot edit entry."));
    };
    authorize_mutation(&entry, &viewer, MutationKind::Edit)?;

    let template = EntryFormTemplate {
        action: format!("/entries/{}/edit", entry.id),
        button: "Update",
        title: entry.title,
        date: entry.date,
        time_spent: entry.time_spent,
        learned: entry.learned,
        resources: entry.resources,
        tags: entry.tags,
        private: entry.private,
        hidden: entry.hidden,
        errors: Vec::new(),
        user: Some(user),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?))
}

async fn update_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Form(form): Form<EntryForm>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::User(user.clone());

    // Authorization and the write happen against the same snapshot.
    let mut tx = state.db.begin().await?;

    let entry: Option<Entry> = sqlx::query_as("SELECT * FROM entries WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(entry) = entry else {
        return Err(AppError::Denied("Cannot edit entry."));
    };
    authorize_mutation(&entry, &viewer, MutationKind::Edit)?;

    let errors = validate_entry_form(&form);
    if !errors.is_empty() {
        return form_with_errors(
            format!("/entries/{}/edit", entry.id),
            "Update",
            &form,
            errors,
            user,
        );
    }

    let (private, hidden) = form.flags();
    let new_tags = form.tags_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE entries
        SET title = ?, date = ?, time_spent = ?, learned = ?, resources = ?, tags = ?, private = ?, hidden = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&form.title)
    .bind(&form.date)
    .bind(form.time_spent)
    .bind(&form.learned)
    .bind(&form.resources)
    .bind(&new_tags)
    .bind(private)
    .bind(hidden)
    .bind(&now)
    .bind(&entry.id)
    .execute(&mut *tx)
    .await?;

    reconcile(&mut tx, &entry.id, &entry.tags, &new_tags).await?;
    tx.commit().await?;

    Ok(Redirect::to(&format!("/entries/{}", entry.id)).into_response())
}

async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::User(user);

    let mut tx = state.db.begin().await?;

    let entry: Option<Entry> = sqlx::query_as("SELECT * FROM entries WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(entry) = entry else {
        return Err(AppError::Denied("Cannot delete entry."));
    };
    authorize_mutation(&entry, &viewer, MutationKind::Delete)?;

    let author_name: (String,) = sqlx::query_as("SELECT username FROM users WHERE id = ?")
        .bind(&entry.user_id)
        .fetch_one(&mut *tx)
        .await?;

    // Associations go first so the entry never leaves dangling rows.
    reconcile(&mut tx, &entry.id, &entry.tags, "").await?;
    sqlx::query("DELETE FROM entries WHERE id = ?")
        .bind(&entry.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Redirect::to(&format!("/users/{}", author_name.0)))
}
