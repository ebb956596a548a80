use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::cache::PageCache;
use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::pagination::{Page, PageQuery};
use crate::posts::feed::{self, Scope};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub page: Page<Post>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_body(body),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Render to a string, for responses that are stored before being sent.
pub fn render<T: Template>(template: &T) -> AppResult<String> {
    template
        .render()
        .map_err(|e| AppError::Internal(format!("Template render error: {}", e)))
}

pub fn html_body(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Home feed. Rendered pages are cached per page number and viewer and are not
/// refreshed by new or edited posts until they expire or the cache is cleared.
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let per_page = state.config.feed.posts_per_page;
    let window = {
        let conn = state.db.get()?;
        feed::window(&conn, Scope::All, per_page, query.page.as_deref())?
    };
    let key = PageCache::key(uri.path(), window.number, maybe_user.id());

    let cached = state.page_cache.lock().await.get(&key).map(str::to_string);
    if let Some(body) = cached {
        return Ok(html_body(body));
    }

    let page = {
        let conn = state.db.get()?;
        feed::fetch(&conn, Scope::All, window)?
    };
    let body = render(&IndexTemplate {
        viewer: maybe_user.username(),
        page,
    })?;

    state.page_cache.lock().await.insert(key, body.clone());
    Ok(html_body(body))
}
