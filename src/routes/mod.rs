pub mod about;
pub mod assets;
pub mod auth;
pub mod home;
pub mod media;
pub mod posts;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole site, ready to serve.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .route("/media/{*path}", get(media::serve))
        .merge(posts::router())
        .merge(auth::router())
        .merge(about::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    use crate::auth::session;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::posts::testing::{insert_post, insert_user};

    fn test_state(uploads: &std::path::Path) -> AppState {
        let mut config = Config::default();
        config.storage.path = Some(uploads.to_path_buf());
        AppState::new(test_pool(), config)
    }

    async fn get(state: &AppState, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = cookie {
            request = request.header(
                header::COOKIE,
                format!("{}={}", state.config.auth.cookie_name, token),
            );
        }
        app(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn public_pages_render() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        {
            let conn = state.db.get().unwrap();
            let author = insert_user(&conn, "leo");
            insert_post(&conn, author, "War and peace, chapter one", None);
        }

        for uri in ["/", "/profile/leo/", "/about/author/", "/about/tech/", "/auth/login/"] {
            let response = get(&state, uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
        let home = body_text(get(&state, "/?page=abc", None).await).await;
        assert!(home.contains("War and peace, chapter one"));
        assert!(home.contains("/auth/login/"));
    }

    #[tokio::test]
    async fn home_cache_is_keyed_by_clamped_page() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        {
            let conn = state.db.get().unwrap();
            let author = insert_user(&conn, "leo");
            insert_post(&conn, author, "post", None);
        }

        for uri in ["/", "/?x=1", "/?x=2", "/?page=0", "/?page=abc", "/?page=99"] {
            let response = get(&state, uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
        assert_eq!(state.page_cache.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_objects_are_404() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());

        for uri in ["/group/nope/", "/profile/nobody/", "/posts/42/", "/no/such/page/"] {
            let response = get(&state, uri, None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn anonymous_users_are_sent_to_login() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        {
            let conn = state.db.get().unwrap();
            let author = insert_user(&conn, "leo");
            insert_post(&conn, author, "post", None);
        }

        let response = get(&state, "/create/", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login/?next=%2Fcreate%2F"
        );

        let response = get(&state, "/follow/?page=2", None).await;
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn session_cookie_identifies_the_viewer() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let token = {
            let conn = state.db.get().unwrap();
            let user = insert_user(&conn, "anna");
            session::create_session(&conn, user, 1).unwrap()
        };

        let response = get(&state, "/create/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("/profile/anna/"));
        assert!(body.contains("enctype=\"multipart/form-data\""));

        let response = get(&state, "/create/", Some("not-a-token")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn non_author_edit_redirects_to_post() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let (post, token) = {
            let conn = state.db.get().unwrap();
            let author = insert_user(&conn, "leo");
            let reader = insert_user(&conn, "anna");
            let post = insert_post(&conn, author, "post", None);
            (post, session::create_session(&conn, reader, 1).unwrap())
        };

        let response = get(&state, &format!("/posts/{}/edit/", post), Some(&token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/posts/{}/", post).as_str()
        );
    }

    #[tokio::test]
    async fn stylesheet_is_embedded_with_etag() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());

        let response = get(&state, "/assets/css/style.css", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        let etag = response.headers()[header::ETAG].clone();

        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/assets/css/style.css")
                    .header(header::IF_NONE_MATCH, etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        let response = get(&state, "/assets/missing.css", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn media_serves_uploads_only() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        std::fs::create_dir_all(tmp.path().join("posts")).unwrap();
        std::fs::write(tmp.path().join("posts/pic.gif"), b"GIF89a").unwrap();

        let response = get(&state, "/media/posts/pic.gif", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");

        let response = get(&state, "/media/posts/missing.gif", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = get(&state, "/media/../secret", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
