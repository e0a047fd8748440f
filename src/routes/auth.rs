use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::auth::{login_user, logout_user, SessionUser, Viewer};
use crate::error::AppError;
use crate::models::User;
use crate::AppState;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
    next: String,
    user: Option<SessionUser>,
    static_hash: &'static str,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    error: Option<String>,
    next: String,
    username: String,
    user: Option<SessionUser>,
    static_hash: &'static str,
}

#[derive(Deserialize)]
pub struct NextParam {
    next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    username: String,
    password: String,
    confirm_password: String,
    next: Option<String>,
}

/// Where to send the user after login/register. The previous page travels
/// as an explicit `next` parameter; only local absolute paths are
/// honored, everything else falls back to the home page.
fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => n.to_string(),
        _ => "/".to_string(),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register_submit))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
}

async fn register_page(
    viewer: Viewer,
    Query(params): Query<NextParam>,
) -> Result<impl IntoResponse, AppError> {
    let template = RegisterTemplate {
        error: None,
        next: safe_next(params.next.as_deref()),
        username: String::new(),
        user: viewer.user().cloned(),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?))
}

fn validate_registration(form: &RegisterForm) -> Option<String> {
    if form.username.is_empty() || !form.username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some("Usernames may only contain letters and numbers.".to_string());
    }
    if form.password.len() < 8 {
        return Some("Password must be at least 8 characters.".to_string());
    }
    if form.password != form.confirm_password {
        return Some("Passwords must match.".to_string());
    }
    None
}

fn register_error(error: String, next: String, username: String) -> Result<Response, AppError> {
    let template = RegisterTemplate {
        error: Some(error),
        next,
        username,
        user: None,
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?).into_response())
}

async fn register_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let next = safe_next(form.next.as_deref());

    if let Some(error) = validate_registration(&form) {
        return register_error(error, next, form.username);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = bcrypt::hash(&form.password, bcrypt::DEFAULT_COST)?;
    let now = chrono::Utc::now().to_rfc3339();

    let inserted = sqlx::query(
        "INSERT INTO users (id, username, password_hash, god, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(&form.username)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await;

    // Registrations racing on the same username lose to the unique index.
    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return register_error("Username already exists.".to_string(), next, form.username);
        }
        Err(e) => return Err(e.into()),
    }

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    login_user(&session, &user).await?;
    Ok(Redirect::to(&next).into_response())
}

async fn login_page(
    viewer: Viewer,
    Query(params): Query<NextParam>,
) -> Result<impl IntoResponse, AppError> {
    let template = LoginTemplate {
        error: None,
        next: safe_next(params.next.as_deref()),
        user: viewer.user().cloned(),
        static_hash: crate::STATIC_HASH,
    };
    Ok(Html(template.render()?))
}

async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let next = safe_next(form.next.as_deref());

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(&form.username)
        .fetch_optional(&state.db)
        .await?;

    // One message for both unknown user and wrong password.
    let verified = match &user {
        Some(user) => bcrypt::verify(&form.password, &user.password_hash)?,
        None => false,
    };

    if let (Some(user), true) = (user, verified) {
        login_user(&session, &user).await?;
        Ok(Redirect::to(&next).into_response())
    } else {
        let template = LoginTemplate {
            error: Some("Incorrect username or password.".to_string()),
            next,
            user: None,
            static_hash: crate::STATIC_HASH,
        };
        Ok(Html(template.render()?).into_response())
    }
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_user(&session).await?;
    Ok(Redirect::to("/"))
}
