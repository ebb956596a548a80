use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{accounts, session};
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::{get_cookie_value, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<String>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub errors: Vec<FieldError>,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub viewer: Option<String>,
}

// -- Request types --

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct NextQuery {
    pub next: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

/// Only local paths are followed after login.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

/// Redirect after a successful login or signup, replacing any previous session.
fn logged_in_redirect(state: &AppState, token: &str, location: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string())],
        AppendHeaders([(
            header::SET_COOKIE,
            session::session_cookie(
                &state.config.auth.cookie_name,
                token,
                state.config.auth.session_hours,
            ),
        )]),
    )
        .into_response()
}

// -- Signup --

/// GET /auth/signup/
pub async fn signup_page(maybe_user: MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        viewer: maybe_user.username(),
        username: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        errors: Vec::new(),
    })
}

/// POST /auth/signup/: create the account and log it in
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<accounts::SignupForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match accounts::create_user(&conn, &form, state.config.auth.bcrypt_cost) {
        Ok(user_id) => {
            let token = session::create_session(&conn, user_id, state.config.auth.session_hours)?;
            Ok(logged_in_redirect(&state, &token, "/"))
        }
        Err(AppError::Validation(errors)) => Ok(Html(SignupTemplate {
            viewer: None,
            username: form.username,
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            errors,
        })
        .into_response()),
        Err(e) => Err(e),
    }
}

// -- Login --

/// GET /auth/login/
pub async fn login_page(
    maybe_user: MaybeUser,
    Query(query): Query<NextQuery>,
) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        viewer: maybe_user.username(),
        username: String::new(),
        next: query.next,
        error: None,
    })
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match accounts::authenticate(&conn, &form.username, &form.password)? {
        Some(user) => {
            let token = session::create_session(&conn, user.id, state.config.auth.session_hours)?;
            tracing::info!("User {} logged in", user.username);
            Ok(logged_in_redirect(&state, &token, safe_next(&form.next)))
        }
        None => Ok(Html(LoginTemplate {
            viewer: None,
            username: form.username,
            next: form.next,
            error: Some(
                "Please enter a correct username and password. Note that both fields may be case-sensitive."
                    .to_string(),
            ),
        })
        .into_response()),
    }
}

// -- Logout --

/// POST /auth/logout/: delete session and show the goodbye page
pub async fn logout(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = get_cookie_value(&parts, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        [(header::SET_COOKIE, session::clear_session_cookie(cookie_name))],
        Html(LoggedOutTemplate { viewer: None }),
    )
        .into_response())
}
