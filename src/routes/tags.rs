use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::auth::Viewer;
use crate::error::AppError;
use crate::routes::entries::render_listing;
use crate::visibility::ListScope;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/tags/{name}", get(show_tag))
}

/// Entries carrying the tag, matched case-insensitively. A tag whose
/// matches are all hidden from the viewer renders as the same 404 as a
/// tag that never existed.
async fn show_tag(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let heading = format!("Entries tagged \u{201c}{name}\u{201d}");
    render_listing(&state.db, ListScope::ByTag(name), &viewer, heading).await
}
