use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::{Entry, User};

const USER_KEY: &str = "user";

/// The slice of a user kept in the session cookie store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub god: bool,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            god: user.god,
        }
    }
}

/// The identity a request is handled under. Every visibility decision
/// takes one of these; `god` users are the privileged viewers.
#[derive(Debug, Clone)]
pub enum Viewer {
    Anonymous,
    User(SessionUser),
}

impl Viewer {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(u) => Some(u),
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Viewer::User(u) if u.god)
    }

    pub fn owns(&self, entry: &Entry) -> bool {
        matches!(self, Viewer::User(u) if u.id == entry.user_id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRedirect(path))?;

        let user: Option<SessionUser> = session.get(USER_KEY).await.ok().flatten();

        Ok(user.map(Viewer::User).unwrap_or(Viewer::Anonymous))
    }
}

/// Extractor for routes that require a logged-in user; anonymous callers
/// are redirected to the login page with the original path as `next`.
pub struct AuthUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        match Viewer::from_request_parts(parts, state).await? {
            Viewer::User(user) => Ok(AuthUser(user)),
            Viewer::Anonymous => Err(AuthRedirect(path)),
        }
    }
}

pub struct AuthRedirect(String);

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        let next: String = url::form_urlencoded::byte_serialize(self.0.as_bytes()).collect();
        Redirect::to(&format!("/login?next={next}")).into_response()
    }
}

pub async fn login_user(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(USER_KEY, SessionUser::from(user)).await
}

pub async fn logout_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
