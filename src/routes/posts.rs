use askama::Template;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::{Comment, Group, Post, User};
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::media;
use crate::pagination::{Page, PageQuery};
use crate::posts::{self, feed, follows, groups, PostInput};
use crate::routes::home::Html;
use crate::state::AppState;

const UPLOAD_LIMIT_BYTES: usize = 8 * 1024 * 1024;

// --- Templates ---

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: User,
    pub post_count: usize,
    pub follower_count: usize,
    pub following: bool,
    /// Logged in and looking at someone else.
    pub show_follow: bool,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<String>,
    pub post: Post,
    pub author_post_count: usize,
    pub can_edit: bool,
    pub comments: Vec<Comment>,
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub errors: Vec<FieldError>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<String>,
    pub page: Page<Post>,
}

// --- Forms ---

#[derive(Debug, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<Vec<u8>>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", post(profile_follow))
        .route("/profile/{username}/unfollow/", post(profile_unfollow))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/follow/", get(follow_index))
        .route(
            "/create/",
            get(post_create_page)
                .post(post_create)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/posts/{id}/edit/",
            get(post_edit_page)
                .post(post_edit)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
}

// --- Handlers ---

async fn group_posts(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupTemplate>> {
    let conn = state.db.get()?;
    let (group, page) = feed::group(
        &conn,
        &slug,
        state.config.feed.posts_per_page,
        query.page.as_deref(),
    )?;

    Ok(Html(GroupTemplate {
        viewer: maybe_user.username(),
        group,
        page,
    }))
}

async fn profile(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let conn = state.db.get()?;
    let profile = feed::profile(
        &conn,
        &username,
        maybe_user.id(),
        state.config.feed.posts_per_page,
        query.page.as_deref(),
    )?;
    let show_follow = maybe_user
        .id()
        .is_some_and(|viewer| viewer != profile.author.id);

    Ok(Html(ProfileTemplate {
        viewer: maybe_user.username(),
        author: profile.author,
        post_count: profile.post_count,
        follower_count: profile.follower_count,
        following: profile.following,
        show_follow,
        page: profile.posts,
    }))
}

async fn post_detail(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Html<PostDetailTemplate>> {
    let conn = state.db.get()?;
    let post = posts::get_post(&conn, id)?;
    let comments = posts::comments(&conn, id)?;
    let author_post_count = feed::count(&conn, feed::Scope::Author(post.author_id))?;
    let can_edit = maybe_user.id() == Some(post.author_id);

    Ok(Html(PostDetailTemplate {
        viewer: maybe_user.username(),
        post,
        author_post_count,
        can_edit,
        comments,
    }))
}

async fn post_create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let conn = state.db.get()?;
    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_options(&conn, None)?,
        errors: Vec::new(),
    }))
}

async fn post_create(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = read_post_form(multipart).await?;
    let conn = state.db.get()?;

    match save_post(&state, &conn, &form, |input| {
        posts::create_post(&conn, user.id, input).map(|_| ())
    }) {
        Ok(()) => Ok(Redirect::to(&format!("/profile/{}/", user.username)).into_response()),
        Err(AppError::Validation(errors)) => Ok(Html(PostFormTemplate {
            viewer: Some(user.username),
            is_edit: false,
            action: "/create/".to_string(),
            groups: group_options(&conn, form.group.trim().parse().ok())?,
            text: form.text,
            errors,
        })
        .into_response()),
        Err(e) => Err(e),
    }
}

async fn post_edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = posts::get_post(&conn, id)?;
    if post.author_id != user.id {
        return Ok(Redirect::to(&format!("/posts/{}/", id)).into_response());
    }

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: true,
        action: format!("/posts/{}/edit/", id),
        groups: group_options(&conn, post.group.as_ref().map(|g| g.id))?,
        text: post.text,
        errors: Vec::new(),
    })
    .into_response())
}

async fn post_edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Response> {
    {
        let conn = state.db.get()?;
        if posts::get_post(&conn, id)?.author_id != user.id {
            return Ok(Redirect::to(&format!("/posts/{}/", id)).into_response());
        }
    }

    let form = read_post_form(multipart).await?;
    let conn = state.db.get()?;
    match save_post(&state, &conn, &form, |input| {
        posts::update_post(&conn, user.id, id, input).map(|_| ())
    }) {
        Ok(()) => Ok(Redirect::to(&format!("/posts/{}/", id)).into_response()),
        Err(AppError::Validation(errors)) => Ok(Html(PostFormTemplate {
            viewer: Some(user.username),
            is_edit: true,
            action: format!("/posts/{}/edit/", id),
            groups: group_options(&conn, form.group.trim().parse().ok())?,
            text: form.text,
            errors,
        })
        .into_response()),
        Err(e) => Err(e),
    }
}

/// Invalid comments are dropped; the reader lands back on the post either way.
async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match posts::add_comment(&conn, user.id, id, &form.text) {
        Ok(_) | Err(AppError::Validation(_)) => {
            Ok(Redirect::to(&format!("/posts/{}/", id)).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let conn = state.db.get()?;
    let page = feed::following(
        &conn,
        user.id,
        state.config.feed.posts_per_page,
        query.page.as_deref(),
    )?;

    Ok(Html(FollowTemplate {
        viewer: Some(user.username),
        page,
    }))
}

async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = crate::auth::accounts::find_by_username(&conn, &username)?;
    follows::follow(&conn, user.id, author.id)?;
    Ok(Redirect::to(&format!("/profile/{}/", username)).into_response())
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = crate::auth::accounts::find_by_username(&conn, &username)?;
    follows::unfollow(&conn, user.id, author.id)?;
    Ok(Redirect::to(&format!("/profile/{}/", username)).into_response())
}

// --- Form helpers ---

async fn read_post_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => form.text = field.text().await?,
            "group" => form.group = field.text().await?,
            "image" => {
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.image = Some(data.to_vec());
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

fn parse_group(raw: &str) -> Result<Option<i64>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| {
        FieldError::new(
            "group",
            "Select a valid choice. That choice is not one of the available choices.",
        )
    })
}

/// Check every field, then store the upload and hand the input to `write`.
/// Nothing touches the disk unless the whole form is valid, and the upload is
/// removed again if `write` fails.
fn save_post(
    state: &AppState,
    conn: &rusqlite::Connection,
    form: &PostForm,
    write: impl FnOnce(&PostInput) -> AppResult<()>,
) -> AppResult<()> {
    let group = parse_group(&form.group);
    let mut input = PostInput {
        text: form.text.clone(),
        group_id: group.as_ref().ok().copied().flatten(),
        image: None,
    };

    let mut errors = match posts::validate(conn, &input) {
        Ok(()) => Vec::new(),
        Err(AppError::Validation(found)) => found,
        Err(e) => return Err(e),
    };
    if let Err(e) = group {
        errors.push(e);
    }
    if form.image.as_deref().is_some_and(|data| media::sniff_image(data).is_none()) {
        errors.push(media::invalid_image());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let uploads = state.config.uploads_path();
    if let Some(data) = &form.image {
        input.image = Some(media::store_image(&uploads, data)?);
    }
    if let Err(e) = write(&input) {
        if let Some(stored) = &input.image {
            media::discard(&uploads, stored);
        }
        return Err(e);
    }
    Ok(())
}

fn group_options(conn: &rusqlite::Connection, selected: Option<i64>) -> AppResult<Vec<GroupOption>> {
    Ok(groups::list(conn)?
        .into_iter()
        .map(|g| GroupOption {
            selected: Some(g.id) == selected,
            id: g.id,
            title: g.title,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_group_accepts_blank_and_ids() {
        assert_eq!(parse_group("").unwrap(), None);
        assert_eq!(parse_group("  ").unwrap(), None);
        assert_eq!(parse_group("12").unwrap(), Some(12));
    }

    #[test]
    fn parse_group_rejects_garbage() {
        assert_eq!(parse_group("cats").unwrap_err().field, "group");
    }

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn test_state(uploads: &std::path::Path) -> AppState {
        let mut config = crate::config::Config::default();
        config.storage.path = Some(uploads.to_path_buf());
        AppState::new(crate::db::test_pool(), config)
    }

    fn stored_files(uploads: &std::path::Path) -> usize {
        std::fs::read_dir(uploads.join(media::POSTS_DIR))
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    #[test]
    fn save_post_reports_every_bad_field_and_stores_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let conn = state.db.get().unwrap();
        let form = PostForm {
            text: "  ".into(),
            group: "cats".into(),
            image: Some(b"BMW review: great car".to_vec()),
        };

        let err = save_post(&state, &conn, &form, |_| panic!("invalid form was written")).unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["text", "group", "image"]);
        assert_eq!(stored_files(tmp.path()), 0);
    }

    #[test]
    fn failed_write_removes_the_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let conn = state.db.get().unwrap();
        let form = PostForm {
            text: "Caption".into(),
            group: String::new(),
            image: Some(SMALL_GIF.to_vec()),
        };

        let err = save_post(&state, &conn, &form, |input| {
            assert!(input.image.is_some());
            Err(AppError::Internal("disk full".into()))
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(stored_files(tmp.path()), 0);

        save_post(&state, &conn, &form, |_| Ok(())).unwrap();
        assert_eq!(stored_files(tmp.path()), 1);
    }
}
